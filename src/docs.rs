use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{access, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::branches::list_branches,
		routes::branches::create_branch,
		routes::branches::get_branch,
		routes::branches::update_branch,
		routes::employees::list_employees,
		routes::employees::create_employee,
		routes::employees::get_employee,
		routes::employees::update_employee,
		routes::employees::delete_employee,
		routes::rbac::list_roles,
		routes::rbac::create_role,
		routes::rbac::get_role,
		routes::rbac::delete_role,
		routes::rbac::get_role_permissions,
		routes::rbac::set_role_permissions,
		routes::rbac::get_user_overrides,
		routes::rbac::set_user_overrides,
		routes::rbac::get_effective_permissions,
		routes::modules::list_modules,
		routes::modules::toggle_module
	),
	components(
		schemas(
			routes::health::HealthResponse,
			access::ActorRole,
			access::ActorStatus,
			access::EffectivePermissionSet,
			access::ScopeView,
			access::GrantType,
			access::UserOverride,
			models::user::UserProfile,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::MeResponse,
			models::branch::Branch,
			models::branch::BranchCreateRequest,
			models::branch::BranchUpdateRequest,
			models::employee::Employee,
			models::employee::EmployeeCreateRequest,
			models::employee::EmployeeUpdateRequest,
			models::module::ModuleFlag,
			models::module::ModuleToggleRequest,
			models::rbac::Role,
			models::rbac::RoleCreateRequest,
			models::rbac::RoleGrants,
			models::rbac::SetRoleGrantsRequest,
			models::rbac::UserOverrides,
			models::rbac::SetUserOverridesRequest,
			models::rbac::EffectivePermissions
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Authentication and the caller's resolved access"),
		(name = "Branches", description = "Tenant branches"),
		(name = "HR", description = "Employees, gated by the hr module"),
		(name = "RBAC", description = "Roles, grants and per-user overrides"),
		(name = "Modules", description = "Module feature flags")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	ensure_security_components(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return; };
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return; };
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));

	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_parameter_examples(operation);
					apply_request_examples(operation);
				}
			}
		}
	}
}

/// Every operation addressed by the branch headers gets them documented.
fn apply_parameter_examples(operation: &mut Value) {
	let secured = operation.get("security").is_some();
	let Some(op) = operation.as_object_mut() else { return; };

	if secured {
		let parameters = op
			.entry("parameters")
			.or_insert_with(|| Value::Array(Vec::new()));
		if let Some(parameters) = parameters.as_array_mut() {
			for (name, description, example) in [
				("x-branch-id", "Target branch id (elevated roles only)", "00000000-0000-0000-0000-000000000000"),
				("x-branch-code", "Target branch code (elevated roles only)", "NORTH"),
			] {
				let header = json!({
					"name": name,
					"in": "header",
					"required": false,
					"description": description,
					"schema": {"type": "string"},
					"example": example
				});
				if !parameters.contains(&header) {
					parameters.push(header);
				}
			}
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/LoginRequest" => Some(json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/SetUserOverridesRequest" => Some(json!({
			"overrides": [
				{"permission": "hr.employee:delete", "grant_type": "deny"},
				{"permission": "branch:read", "grant_type": "allow"}
			]
		})),
		"#/components/schemas/ModuleToggleRequest" => Some(json!({
			"is_enabled": true,
			"name": "Human Resources"
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}
