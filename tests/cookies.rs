use httpmock::{
    Method::{GET, POST},
    MockServer,
};

mod common;

use kaskade::prelude::*;

const LOGIN_PATH: &str = "/login";
const PROFILE_PATH: &str = "/profile";

const SESSION_COOKIE: &str = "KASKADESESSION";

#[test]
#[cfg_attr(not(feature = "cookies"), ignore)]
// Cookies set by an earlier request are sent by later requests in the same session.
fn cookies_follow_session() {
    const ITERATIONS: i64 = 3;

    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path(LOGIN_PATH);
        then.status(200)
            .header("set-cookie", &format!("{}=kaskade; Path=/", SESSION_COOKIE));
    });
    // Only matches requests carrying the session cookie, anything else is a 404.
    let profile = server.mock(|when, then| {
        when.method(GET)
            .path(PROFILE_PATH)
            .header("cookie", &format!("{}=kaskade", SESSION_COOKIE));
        then.status(200);
    });

    let session = common::build_session(
        &server,
        ITERATIONS,
        ITERATIONS,
        vec![
            RequestDefinition::new(1, LOGIN_PATH).set_method("POST"),
            RequestDefinition::new(2, PROFILE_PATH),
        ],
    );
    let result = common::run_load_test(session);

    common::validate_result(&result, ITERATIONS as usize, 0);
    assert_eq!(login.hits(), ITERATIONS as usize);
    assert_eq!(profile.hits(), ITERATIONS as usize);
}

#[test]
// A new session starts without the cookies of earlier sessions.
fn cookies_not_shared() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(LOGIN_PATH);
        then.status(200)
            .header("set-cookie", &format!("{}=kaskade; Path=/", SESSION_COOKIE));
    });
    // Any request to the profile carrying a cookie fails.
    let with_cookie = server.mock(|when, then| {
        when.method(GET).path(PROFILE_PATH).header_exists("cookie");
        then.status(409);
    });
    let without_cookie = server.mock(|when, then| {
        when.method(GET).path(PROFILE_PATH).header_missing("cookie");
        then.status(200);
    });

    // The profile is requested before logging in, one session at a time.
    let session = common::build_session(
        &server,
        1,
        2,
        vec![
            RequestDefinition::new(1, PROFILE_PATH),
            RequestDefinition::new(2, LOGIN_PATH).set_method("POST"),
        ],
    );
    let result = common::run_load_test(session);

    common::validate_result(&result, 2, 0);
    assert_eq!(with_cookie.hits(), 0);
    assert_eq!(without_cookie.hits(), 2);
}
