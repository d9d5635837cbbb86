//! `me`: who the auth token belongs to. Used to check a token before any
//! long-running work.

use serde::Deserialize;

use super::files::decode;
use super::models::{ApiError, User};
use super::{HttpTransport, TransportError};
use crate::error::TransferError;

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    error: Option<ApiError>,
}

/// Fetches the token's user. A rejected token is [`TransferError::Api`].
pub fn me(http: &dyn HttpTransport) -> Result<User, TransferError> {
    let res = http.get("me", &[])?;
    let body: MeResponse = decode(&res)?;
    if let Some(err) = body.error {
        return Err(TransferError::Api(err));
    }
    match body.user {
        Some(user) => Ok(user),
        None if res.is_success() => Err(TransportError::Missing("user").into()),
        None => Err(TransportError::Http(res.status).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FilePart, HttpResponse};

    struct Fixed(u32, &'static str);

    impl HttpTransport for Fixed {
        fn get(&self, path: &str, params: &[(&str, String)]) -> Result<HttpResponse, TransferError> {
            assert_eq!(path, "me");
            assert!(params.is_empty());
            Ok(HttpResponse {
                status: self.0,
                body: self.1.as_bytes().to_vec(),
            })
        }

        fn multipart_post(
            &self,
            _: &str,
            _: &[(&str, String)],
            _: FilePart<'_>,
        ) -> Result<HttpResponse, TransferError> {
            unreachable!("me never posts")
        }
    }

    #[test]
    fn returns_user() {
        let user = me(&Fixed(
            200,
            r#"{"user":{"id":5,"username":"dev","display_name":"Dev Team","created_on":1500000000}}"#,
        ))
        .unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.name(), "Dev Team");
    }

    #[test]
    fn name_falls_back_to_username() {
        let user = me(&Fixed(200, r#"{"user":{"id":5,"username":"dev"}}"#)).unwrap();
        assert_eq!(user.name(), "dev");
    }

    #[test]
    fn invalid_token_is_api_error() {
        let err = me(&Fixed(401, r#"{"error":{"code":2,"message":"Invalid token."}}"#))
            .unwrap_err();
        match err {
            TransferError::Api(e) => assert!(e.is_auth()),
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn empty_bodies() {
        let err = me(&Fixed(200, "{}")).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transport(TransportError::Missing("user"))
        ));
        let err = me(&Fixed(502, "<html/>")).unwrap_err();
        assert!(matches!(err, TransferError::Transport(TransportError::Http(502))));
    }
}
