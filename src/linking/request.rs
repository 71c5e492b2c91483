//! # 授权请求校验
//!
//! 解析助手平台发来的 `/auth` 查询串并校验：
//! - `redirect_uri` 必须是 `https://oauth-redirect.<platform_domain>/r/<project_id>`
//! - `client_id` 必须等于中继注册的 `provider_client_id`
//!
//! 两项校验总是都会执行；二者都失败时报告 `InvalidClient`。

use url::Url;

use super::query::parse_pairs;
use super::state::RelayState;
use crate::config::RelayConfig;
use crate::error::{LinkError, LinkResult};
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;

/// 入站授权请求
///
/// 缺失的字段为空字符串，拒绝全部推迟到 [`AuthorizationRequest::validate`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    /// 已百分号解码一次
    pub redirect_uri: String,
    pub state: RelayState,
    pub response_type: String,
}

/// 通过校验的授权请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest(AuthorizationRequest);

impl ValidatedRequest {
    #[must_use]
    pub const fn state(&self) -> &RelayState {
        &self.0.state
    }
}

impl AuthorizationRequest {
    /// 从原始查询串解析
    ///
    /// 每个值只解码一次；参数重复时取第一次出现的值。`state` 保留原始字节，
    /// 其余字段按 UTF-8 有损解码后再参与比较。
    #[must_use]
    pub fn from_query(raw_query: &str) -> Self {
        let mut client_id = None;
        let mut redirect_uri = None;
        let mut state = None;
        let mut response_type = None;

        for (key, value) in parse_pairs(raw_query.as_bytes()) {
            let slot = match key.as_str() {
                "client_id" => &mut client_id,
                "redirect_uri" => &mut redirect_uri,
                "state" => &mut state,
                "response_type" => &mut response_type,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        let text = |value: Option<Vec<u8>>| {
            value
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };

        Self {
            client_id: text(client_id),
            redirect_uri: text(redirect_uri),
            state: RelayState::new(state.unwrap_or_default()),
            response_type: text(response_type),
        }
    }

    /// 校验请求，纯函数
    pub fn validate(self, config: &RelayConfig) -> LinkResult<ValidatedRequest> {
        self.validate_logged(config, "-")
    }

    /// 校验请求并按请求ID记录失败原因
    pub fn validate_logged(self, config: &RelayConfig, request_id: &str) -> LinkResult<ValidatedRequest> {
        let redirect_check = check_redirect_uri(&self.redirect_uri, config);
        let client_ok = self.client_id == config.provider_client_id;

        if let Err(reason) = &redirect_check {
            lwarn!(
                request_id,
                LogStage::Authorize,
                LogComponent::Validator,
                "invalid_redirect",
                &format!("redirect_uri rejected: {reason}")
            );
        }
        if !client_ok {
            lwarn!(
                request_id,
                LogStage::Authorize,
                LogComponent::Validator,
                "invalid_client",
                &format!("unexpected client_id '{}'", self.client_id)
            );
            return Err(LinkError::InvalidClient {
                client_id: self.client_id,
            });
        }

        redirect_check.map_err(|reason| LinkError::invalid_redirect(&self.redirect_uri, reason))?;
        Ok(ValidatedRequest(self))
    }
}

/// 结构化比较 `redirect_uri` 与完成端点
///
/// 主机名按 URL 规范做大小写归一后比较；路径、查询、片段、端口和用户信息逐项检查。
pub fn check_redirect_uri(raw: &str, config: &RelayConfig) -> Result<(), String> {
    if raw.is_empty() {
        return Err("redirect_uri is missing".to_string());
    }
    // Url::parse 会静默去除空白和控制字符
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("redirect_uri contains whitespace or control characters".to_string());
    }
    if has_path_rewrites(raw) {
        return Err("redirect_uri path contains dot segments or backslashes".to_string());
    }

    let url = Url::parse(raw).map_err(|e| format!("redirect_uri is not an absolute URL: {e}"))?;

    if url.scheme() != "https" {
        return Err(format!("scheme '{}' is not https", url.scheme()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("userinfo is not allowed".to_string());
    }
    let expected_host = config.completion_host();
    if url.host_str() != Some(expected_host.as_str()) {
        return Err(format!(
            "host '{}' does not match '{expected_host}'",
            url.host_str().unwrap_or_default()
        ));
    }
    if url.port().is_some() {
        return Err("explicit port is not allowed".to_string());
    }
    let expected_path = config.completion_path();
    if url.path() != expected_path {
        return Err(format!(
            "path '{}' does not match '{expected_path}'",
            url.path()
        ));
    }
    if url.query().is_some() {
        return Err("query string is not allowed".to_string());
    }
    if url.fragment().is_some() {
        return Err("fragment is not allowed".to_string());
    }
    Ok(())
}

/// Url::parse 会折叠 `.`、`..`（含 `%2e` 写法）并把 `\` 当作 `/`
fn has_path_rewrites(raw: &str) -> bool {
    if raw.contains('\\') {
        return true;
    }
    let after_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let before_query = after_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let Some(path_start) = before_query.find('/') else {
        return false;
    };
    before_query[path_start..].split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn config() -> RelayConfig {
        RelayConfig::new("abc", "secret", "proj1", "https://relay.example.org/exch")
            .with_platform_domain("example.com")
    }

    fn query(client_id: &str, redirect_uri: &str, state: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .finish()
    }

    #[test]
    fn parses_all_fields() {
        let raw = "client_id=GOOGLE_CLIENT_ID&redirect_uri=REDIRECT_URI&state=STATE_STRING&response_type=token";
        let request = AuthorizationRequest::from_query(raw);

        assert_eq!(request.client_id, "GOOGLE_CLIENT_ID");
        assert_eq!(request.redirect_uri, "REDIRECT_URI");
        assert_eq!(request.state.as_bytes(), b"STATE_STRING");
        assert_eq!(request.response_type, "token");
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let request = AuthorizationRequest::from_query("client_id=abc&unrelated=1");
        assert_eq!(request.client_id, "abc");
        assert_eq!(request.redirect_uri, "");
        assert!(request.state.is_empty());
        assert_eq!(request.response_type, "");
    }

    #[test]
    fn redirect_uri_is_decoded_exactly_once() {
        let raw = "redirect_uri=https%253A%252F%252Foauth-redirect.example.com%252Fr%252Fproj1";
        let request = AuthorizationRequest::from_query(raw);
        assert_eq!(request.redirect_uri, "https%3A%2F%2Foauth-redirect.example.com%2Fr%2Fproj1");
        assert!(request.validate(&config()).is_err());
    }

    #[test]
    fn first_occurrence_wins() {
        let request = AuthorizationRequest::from_query("state=first&state=second");
        assert_eq!(request.state.as_bytes(), b"first");
    }

    #[test]
    fn non_utf8_state_is_kept_byte_for_byte() {
        let raw = "client_id=abc&redirect_uri=https%3A%2F%2Foauth-redirect.example.com%2Fr%2Fproj1&state=%FF%FE&response_type=code";
        let validated = AuthorizationRequest::from_query(raw).validate(&config()).unwrap();
        assert_eq!(validated.state().as_bytes(), [0xFF, 0xFE]);
    }

    #[test]
    fn accepts_the_expected_completion_endpoint() {
        let raw = "client_id=abc&redirect_uri=https%3A%2F%2Foauth-redirect.example.com%2Fr%2Fproj1&state=xyz&response_type=code";
        let validated = AuthorizationRequest::from_query(raw).validate(&config()).unwrap();
        assert_eq!(validated.state().as_bytes(), b"xyz");
    }

    #[rstest]
    #[case::other_project("https://oauth-redirect.example.com/r/proj2")]
    #[case::http_scheme("http://oauth-redirect.example.com/r/proj1")]
    #[case::other_host("https://oauth-redirect.evil.com/r/proj1")]
    #[case::suffix_host("https://oauth-redirect.example.com.evil.com/r/proj1")]
    #[case::trailing_slash("https://oauth-redirect.example.com/r/proj1/")]
    #[case::query("https://oauth-redirect.example.com/r/proj1?x=1")]
    #[case::empty_query("https://oauth-redirect.example.com/r/proj1?")]
    #[case::fragment("https://oauth-redirect.example.com/r/proj1#frag")]
    #[case::port("https://oauth-redirect.example.com:8443/r/proj1")]
    #[case::userinfo("https://user@oauth-redirect.example.com/r/proj1")]
    #[case::leading_space(" https://oauth-redirect.example.com/r/proj1")]
    #[case::relative("/r/proj1")]
    #[case::dot_dot_segment("https://oauth-redirect.example.com/r/x/../proj1")]
    #[case::dot_segment("https://oauth-redirect.example.com/r/./proj1")]
    #[case::encoded_dot_segment("https://oauth-redirect.example.com/r/x/%2E%2e/proj1")]
    #[case::backslash("https://oauth-redirect.example.com\\r\\proj1")]
    #[case::empty("")]
    fn rejects_redirect_mismatch(#[case] redirect_uri: &str) {
        let err = AuthorizationRequest::from_query(&query("abc", redirect_uri, "s"))
            .validate(&config())
            .unwrap_err();
        assert!(
            matches!(err, LinkError::InvalidRedirect { .. }),
            "{redirect_uri}: {err}"
        );
    }

    #[test]
    fn host_comparison_is_case_insensitive() {
        let request =
            AuthorizationRequest::from_query(&query("abc", "https://OAUTH-REDIRECT.example.com/r/proj1", "s"));
        assert!(request.validate(&config()).is_ok());
    }

    #[test]
    fn invalid_client_wins_over_invalid_redirect() {
        let err = AuthorizationRequest::from_query(&query("other", "https://evil.com/r/proj1", "s"))
            .validate(&config())
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidClient { client_id } if client_id == "other"));
    }

    #[test]
    fn invalid_client_with_valid_redirect() {
        let err = AuthorizationRequest::from_query(&query(
            "",
            "https://oauth-redirect.example.com/r/proj1",
            "s",
        ))
        .validate(&config())
        .unwrap_err();
        assert!(matches!(err, LinkError::InvalidClient { .. }));
    }
}
