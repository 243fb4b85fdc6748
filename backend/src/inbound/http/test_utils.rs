//! Test helpers for inbound HTTP components.

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpResponse, test, web};

use crate::domain::{Error, UserId};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// User every test session is logged in as.
pub const TEST_USER: &str = "11111111-1111-1111-1111-111111111111";
/// A well-formed user id that differs from [`TEST_USER`].
pub const OTHER_USER: &str = "22222222-2222-2222-2222-222222222222";

const LOGIN_PATH: &str = "/test-login";

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

async fn test_login(session: SessionContext) -> Result<HttpResponse, Error> {
    let user = UserId::new(TEST_USER).map_err(|err| Error::internal(err.to_string()))?;
    session.persist_user(&user)?;
    Ok(HttpResponse::Ok().finish())
}

/// App with the given handlers mounted under `/api/2` and a login shortcut
/// standing in for the external auth service.
pub fn test_app(
    state: HttpState,
    configure: impl FnOnce(&mut web::ServiceConfig),
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .wrap(test_session_middleware())
        .route(LOGIN_PATH, web::post().to(test_login))
        .service(web::scope("/api/2").configure(configure))
}

/// Log in as [`TEST_USER`] and return the session cookie.
pub async fn login_cookie(
    app: &impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
) -> Cookie<'static> {
    let response =
        test::call_service(app, test::TestRequest::post().uri(LOGIN_PATH).to_request()).await;
    assert!(response.status().is_success());
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie")
        .into_owned()
}
