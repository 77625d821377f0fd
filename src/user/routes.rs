use crate::api_error::{ActionResponse, ApiError};
use crate::config::Config;
use crate::user::{
    create_user, AuthResponse, AuthUser, CreateUserRequest, CreateUserResponse, LoginRequest,
    Profile, Role,
};
use actix_identity::Identity;
use actix_web::{get, post, web, HttpResponse};

#[post("/sign-in/")]
async fn sign_in(
    credentials: web::Json<LoginRequest>,
    identity: Identity,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let credentials = credentials.into_inner();
    let invalid = || ApiError::new(401, "Invalid Credentials".to_string());

    let profile = Profile::find_by_email(&credentials.email)?.ok_or_else(invalid)?;

    if !profile.verify_password(credentials.password.as_bytes())? {
        return Err(invalid());
    }

    let token = profile.generate_token(&config)?;
    identity.remember(token.clone());

    let response = AuthResponse {
        token,
        role: profile.role()?,
    };

    Ok(HttpResponse::Ok().json(response))
}

#[post("/sign-out/")]
async fn sign_out(identity: Identity) -> Result<HttpResponse, ApiError> {
    identity.forget();
    Ok(HttpResponse::Ok().json(ActionResponse::ok("Signed out")))
}

#[get("/me/")]
async fn me(identity: AuthUser) -> Result<HttpResponse, ApiError> {
    let profile = Profile::find(identity.id)?;
    Ok(HttpResponse::Ok().json(profile))
}

#[post("/admin/users/")]
async fn create(
    request: web::Json<CreateUserRequest>,
    identity: AuthUser,
) -> Result<HttpResponse, ApiError> {
    identity.require(Role::Admin)?;

    let credentials = create_user(request.into_inner())?;

    Ok(HttpResponse::Ok().json(CreateUserResponse {
        success: true,
        credentials,
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(sign_in);
    cfg.service(sign_out);
    cfg.service(me);
    cfg.service(create);
}
