use actix_identity::RequestIdentity;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{err, ok, Ready};

use crate::api_error::ApiError;
use crate::config::Config;
use crate::user::{AuthUser, Profile};

pub type LoggedUser = AuthUser;

fn session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    bearer.or_else(|| req.get_identity())
}

impl FromRequest for LoggedUser {
    type Error = ApiError;
    type Future = Ready<Result<LoggedUser, ApiError>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let config = match req.app_data::<web::Data<Config>>() {
            Some(config) => config,
            None => return err(ApiError::new(500, "Configuration not registered".to_string())),
        };

        match session_token(req) {
            Some(token) => match Profile::decode_token(&token, config) {
                Ok(user) => ok(user),
                Err(e) => err(e),
            },
            None => err(ApiError::unauthorized()),
        }
    }
}
