/// Per-request parameters and the auxiliary parameter merge
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use std::time::Duration;
use tracing::warn;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ACTIVITY_HEADER: &str = "x-giant-swarm-activity";
pub const CMDLINE_HEADER: &str = "x-giant-swarm-cmdline";

/// Set to any non-empty value to stop sending the command line
pub const DISABLE_CMDLINE_TRACKING_ENV: &str = "GSCTL_DISABLE_CMDLINE_TRACKING";

const REQUEST_ID_LENGTH: usize = 14;
const REQUEST_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const REDACTED: &str = "REDACTED";

/// Optional per-call overrides. Unset, empty or zero fields inherit the
/// wrapper defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryParams {
    pub command_line: Option<String>,
    pub request_id: Option<String>,
    pub activity_name: Option<String>,
    pub timeout: Option<Duration>,
}

impl AuxiliaryParams {
    pub fn with_activity(mut self, activity_name: impl Into<String>) -> Self {
        self.activity_name = Some(activity_name.into());
        self
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = Some(command_line.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Wrapper-level values applied to every request before any override
#[derive(Debug, Clone, Default)]
pub(crate) struct BaseParams<'a> {
    pub timeout: Option<Duration>,
    pub command_line: Option<&'a str>,
    pub activity_name: Option<&'a str>,
    pub request_id: Option<&'a str>,
}

/// Anything that can carry the auxiliary request metadata
pub trait ParamSetter {
    fn set_timeout(&mut self, timeout: Duration);
    fn set_activity(&mut self, activity_name: &str);
    fn set_request_id(&mut self, request_id: &str);
    fn set_command_line(&mut self, command_line: &str);
}

/// Parameter types for operations that need an Authorization header
pub trait AuthorizedParamSetter: ParamSetter {
    fn set_authorization(&mut self, value: &str);
}

/// Apply base values first, then let non-empty overrides win
pub(crate) fn apply_params<P: ParamSetter + ?Sized>(
    base: &BaseParams<'_>,
    overrides: Option<&AuxiliaryParams>,
    params: &mut P,
) {
    if let Some(timeout) = base.timeout.filter(|t| !t.is_zero()) {
        params.set_timeout(timeout);
    }
    if let Some(cmd) = non_empty(base.command_line) {
        params.set_command_line(cmd);
    }
    if let Some(activity) = non_empty(base.activity_name) {
        params.set_activity(activity);
    }
    if let Some(id) = non_empty(base.request_id) {
        params.set_request_id(id);
    }

    let Some(aux) = overrides else {
        return;
    };

    if let Some(timeout) = aux.timeout.filter(|t| !t.is_zero()) {
        params.set_timeout(timeout);
    }
    if let Some(cmd) = non_empty(aux.command_line.as_deref()) {
        params.set_command_line(cmd);
    }
    if let Some(activity) = non_empty(aux.activity_name.as_deref()) {
        params.set_activity(activity);
    }
    if let Some(id) = non_empty(aux.request_id.as_deref()) {
        params.set_request_id(id);
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A single API request before it is handed to reqwest
#[derive(Debug, Clone)]
pub struct RequestParams {
    method: Method,
    segments: Vec<String>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    authorization: Option<String>,
    activity_name: Option<String>,
    request_id: Option<String>,
    command_line: Option<String>,
}

impl RequestParams {
    /// Create parameters for `method` on the path built from `segments`
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: None,
            timeout: None,
            authorization: None,
            activity_name: None,
            request_id: None,
            command_line: None,
        }
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn activity_name(&self) -> Option<&str> {
        self.activity_name.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn command_line(&self) -> Option<&str> {
        self.command_line.as_deref()
    }

    /// Build the header map for this request. Values that are not valid
    /// header values are dropped with a warning.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let entries = [
            (AUTHORIZATION, self.authorization.as_deref()),
            (
                HeaderName::from_static(REQUEST_ID_HEADER),
                self.request_id.as_deref(),
            ),
            (
                HeaderName::from_static(ACTIVITY_HEADER),
                self.activity_name.as_deref(),
            ),
            (
                HeaderName::from_static(CMDLINE_HEADER),
                self.command_line.as_deref(),
            ),
        ];

        for (name, value) in entries {
            let Some(value) = value else { continue };
            match HeaderValue::from_bytes(value.as_bytes()) {
                Ok(mut header_value) => {
                    if name == AUTHORIZATION {
                        header_value.set_sensitive(true);
                    }
                    headers.insert(name, header_value);
                }
                Err(_) => warn!("Skipping header {} with invalid value", name),
            }
        }

        headers
    }
}

impl ParamSetter for RequestParams {
    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    fn set_activity(&mut self, activity_name: &str) {
        self.activity_name = Some(activity_name.to_string());
    }

    fn set_request_id(&mut self, request_id: &str) {
        self.request_id = Some(request_id.to_string());
    }

    fn set_command_line(&mut self, command_line: &str) {
        self.command_line = Some(command_line.to_string());
    }
}

impl AuthorizedParamSetter for RequestParams {
    fn set_authorization(&mut self, value: &str) {
        self.authorization = Some(value.to_string());
    }
}

/// Generate a random request ID from the given random source
pub fn random_request_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..REQUEST_ID_LENGTH)
        .map(|_| REQUEST_ID_CHARSET[rng.gen_range(0..REQUEST_ID_CHARSET.len())] as char)
        .collect()
}

/// Command line of the running process with passwords redacted, or an
/// empty string if tracking is disabled through the environment
pub fn current_command_line() -> String {
    let tracking_disabled = std::env::var(DISABLE_CMDLINE_TRACKING_ENV)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    command_line(std::env::args().collect(), tracking_disabled)
}

/// Redacted, space-joined argument list, empty when tracking is disabled
pub fn command_line(args: Vec<String>, tracking_disabled: bool) -> String {
    if tracking_disabled {
        return String::new();
    }
    redact_password_args(args).join(" ")
}

/// Global options that consume the following argument
const GLOBAL_VALUE_OPTIONS: &[&str] = &["--endpoint", "--auth-token", "--config", "--output", "-o"];

/// Short flags that never take a value
const SHORT_SWITCHES: &[char] = &['v', 'h', 'V'];

/// First positional argument, skipping global options and their values
fn subcommand(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--" {
            return None;
        }
        if GLOBAL_VALUE_OPTIONS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if let Some(flags) = arg.strip_prefix('-') {
            // "-vo json" hands the next argument to -o
            if !flags.starts_with('-') {
                let switches = flags.trim_end_matches('o');
                skip_next = flags.ends_with('o')
                    && switches.len() + 1 == flags.len()
                    && switches.chars().all(|c| SHORT_SWITCHES.contains(&c));
            }
            continue;
        }
        return Some(arg);
    }
    None
}

/// Redact the value of a short `-p` flag, also when it is joined to the
/// flag or clustered behind switches. The bool asks for the next argument
/// to be redacted.
fn redact_short_password(arg: &str) -> Option<(String, bool)> {
    let flags = arg.strip_prefix('-').filter(|f| !f.starts_with('-'))?;
    for (i, c) in flags.char_indices() {
        if SHORT_SWITCHES.contains(&c) {
            continue;
        }
        if c != 'p' {
            return None;
        }
        let flag = &arg[..i + 2];
        let value = &flags[i + 1..];
        return Some(if value.is_empty() {
            (arg.to_string(), true)
        } else if value.starts_with('=') {
            (format!("{}={}", flag, REDACTED), false)
        } else {
            (format!("{}{}", flag, REDACTED), false)
        });
    }
    None
}

/// Replace password values in an argument list with "REDACTED".
///
/// `--password` is redacted for every command, `-p` only for `login`.
pub fn redact_password_args(mut args: Vec<String>) -> Vec<String> {
    let is_login = subcommand(&args) == Some("login");
    let mut redact_next = false;

    for arg in args.iter_mut() {
        if redact_next {
            *arg = REDACTED.to_string();
            redact_next = false;
            continue;
        }

        if arg.starts_with("--password=") {
            *arg = format!("--password={}", REDACTED);
        } else if arg == "--password" {
            redact_next = true;
        } else if is_login {
            if let Some((redacted, value_follows)) = redact_short_password(arg) {
                *arg = redacted;
                redact_next = value_follows;
            }
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_override_does_not_clobber_base() {
        let base = BaseParams {
            timeout: Some(Duration::from_secs(20)),
            request_id: Some("A"),
            ..Default::default()
        };
        let overrides = AuxiliaryParams {
            timeout: Some(Duration::ZERO),
            request_id: Some("B".to_string()),
            ..Default::default()
        };

        let mut params = RequestParams::new(Method::GET, ["v4", "clusters"]);
        apply_params(&base, Some(&overrides), &mut params);

        assert_eq!(params.timeout(), Some(Duration::from_secs(20)));
        assert_eq!(params.request_id(), Some("B"));
    }

    #[test]
    fn test_base_values_without_overrides() {
        let base = BaseParams {
            timeout: Some(Duration::from_secs(5)),
            command_line: Some("gsctl list clusters"),
            activity_name: Some("list-clusters"),
            request_id: Some("abc"),
        };

        let mut params = RequestParams::new(Method::GET, ["v4", "clusters"]);
        apply_params(&base, None, &mut params);

        assert_eq!(params.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(params.command_line(), Some("gsctl list clusters"));
        assert_eq!(params.activity_name(), Some("list-clusters"));
        assert_eq!(params.request_id(), Some("abc"));
        assert_eq!(params.authorization(), None);
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let base = BaseParams {
            activity_name: Some(""),
            ..Default::default()
        };
        let overrides = AuxiliaryParams::default()
            .with_activity("")
            .with_command_line("gsctl info");

        let mut params = RequestParams::new(Method::GET, ["v4", "info"]);
        apply_params(&base, Some(&overrides), &mut params);

        assert_eq!(params.activity_name(), None);
        assert_eq!(params.command_line(), Some("gsctl info"));
        assert_eq!(params.timeout(), None);
    }

    #[test]
    fn test_headers() {
        let mut params = RequestParams::new(Method::GET, ["v4", "info"]);
        params.set_request_id("req");
        params.set_activity("show-info");
        params.set_authorization("giantswarm token");

        let headers = params.headers();
        assert_eq!(headers[REQUEST_ID_HEADER], "req");
        assert_eq!(headers[ACTIVITY_HEADER], "show-info");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert!(!headers.contains_key(CMDLINE_HEADER));
    }

    #[test]
    fn test_invalid_header_value_is_skipped() {
        let mut params = RequestParams::new(Method::GET, ["v4", "info"]);
        params.set_command_line("gsctl\nlogin");
        assert!(!params.headers().contains_key(CMDLINE_HEADER));
    }

    #[test]
    fn test_random_request_id() {
        let mut rng = StdRng::seed_from_u64(42);
        let first = random_request_id(&mut rng);
        assert_eq!(first.len(), REQUEST_ID_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphabetic()));

        // Same seed, same sequence
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(random_request_id(&mut rng), first);
    }

    #[test]
    fn test_redact_login_short_flag() {
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "-p", "secret"])),
            args(&["gsctl", "login", "-p", "REDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "-p=secret"])),
            args(&["gsctl", "login", "-p=REDACTED"])
        );
    }

    #[test]
    fn test_redact_login_after_global_options() {
        assert_eq!(
            redact_password_args(args(&["gsctl", "-v", "login", "-e", "x@y.z", "-p", "secret"])),
            args(&["gsctl", "-v", "login", "-e", "x@y.z", "-p", "REDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&[
                "gsctl", "--endpoint", "https://api", "-o", "json", "login", "-p", "secret",
            ])),
            args(&["gsctl", "--endpoint", "https://api", "-o", "json", "login", "-p", "REDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&["gsctl", "-vo", "json", "login", "-p", "secret"])),
            args(&["gsctl", "-vo", "json", "login", "-p", "REDACTED"])
        );
    }

    #[test]
    fn test_redact_joined_short_flag() {
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "-e", "x@y.z", "-psecret"])),
            args(&["gsctl", "login", "-e", "x@y.z", "-pREDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "-vpsecret"])),
            args(&["gsctl", "login", "-vpREDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "-vp", "secret"])),
            args(&["gsctl", "login", "-vp", "REDACTED"])
        );
    }

    #[test]
    fn test_option_value_is_not_the_command() {
        let input = args(&["gsctl", "--endpoint", "login", "create", "keypair", "-p", "value"]);
        assert_eq!(redact_password_args(input.clone()), input);
    }

    #[test]
    fn test_command_line_tracking() {
        let input = args(&["gsctl", "login", "-e", "x@y.z", "-p", "secret"]);
        assert_eq!(command_line(input.clone(), true), "");
        assert_eq!(
            command_line(input, false),
            "gsctl login -e x@y.z -p REDACTED"
        );
    }

    #[test]
    fn test_redact_long_flag() {
        assert_eq!(
            redact_password_args(args(&["gsctl", "create", "--password=secret"])),
            args(&["gsctl", "create", "--password=REDACTED"])
        );
        assert_eq!(
            redact_password_args(args(&["gsctl", "login", "a@b.c", "--password", "secret"])),
            args(&["gsctl", "login", "a@b.c", "--password", "REDACTED"])
        );
    }

    #[test]
    fn test_short_flag_outside_login_is_kept() {
        let input = args(&["gsctl", "create", "keypair", "-p", "value"]);
        assert_eq!(redact_password_args(input.clone()), input);
    }

    #[test]
    fn test_trailing_password_flag() {
        let input = args(&["gsctl", "login", "--password"]);
        assert_eq!(redact_password_args(input.clone()), input);
    }
}
