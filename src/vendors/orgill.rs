//! Orgill dealer portal search.
//!
//! The portal is an ASP.NET WebForms site: every post carries the page's
//! hidden `__VIEWSTATE` fields, and searches only work on a logged-in
//! session. The session cookie lives in the client's cookie store, so the
//! login runs once per searcher.

use crate::error::CollectError;
use crate::models::InputRow;
use crate::normalize::normalize_upc;
use crate::site::SiteFetch;
use crate::vendors::{Locator, Vendor};
use anyhow::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const HOME_PATH: &str = "/Default.aspx";
const LOGIN_PATH: &str = "/index.aspx?tab=8";

const SIGNED_IN_MARKERS: &[&str] = &["Sign Out", "signOut.aspx", "My Profile"];
const LOGIN_ERROR_NEEDLES: &[&str] = &["Password Expired", "Failed Login Attempts", "Update Password"];

const USER_FIELDS: &[&str] = &[
    "ctl00$cphMainContent$ctl00$loginOrgillxs$UserName",
    "Login1$UserName",
    "ctl00$MainContent$Login1$UserName",
    "UserName",
    "username",
];
const PASS_FIELDS: &[&str] = &[
    "ctl00$cphMainContent$ctl00$loginOrgillxs$Password",
    "Login1$Password",
    "ctl00$MainContent$Login1$Password",
    "Password",
    "password",
];
const SUBMIT_FIELD: &str = "ctl00$cphMainContent$ctl00$loginOrgillxs$LoginButton";
const REMEMBER_FIELD: &str = "ctl00$cphMainContent$ctl00$loginOrgillxs$RememberMe";
const WEBFORMS_FIELDS: &[&str] = &["__EVENTTARGET", "__EVENTARGUMENT", "__LASTFOCUS"];

/// Header search controls, with and without the master page prefix.
const SEARCH_PREFIXES: &[&str] = &["ctl00$", ""];

static FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static INPUT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static ERROR_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#cphMainContent_lblErrorMessage").unwrap());
static LOGIN_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)login|index\.aspx\?tab=8").unwrap());

static PRODUCT_LINKS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)href="(/index\.aspx\?tab=7&amp;sku=\d+)""#).unwrap(),
        Regex::new(r#"(?i)href="(/index\.aspx\?tab=7&sku=\d+)""#).unwrap(),
        Regex::new(r#"(?i)href="(/product/[^"]+)""#).unwrap(),
    ]
});

/// Ordered form fields.
pub type FormFields = Vec<(String, String)>;

fn set_field(fields: &mut FormFields, name: &str, value: &str) {
    match fields.iter_mut().find(|(k, _)| k == name) {
        Some(field) => field.1 = value.to_string(),
        None => fields.push((name.to_string(), value.to_string())),
    }
}

fn has_field(fields: &FormFields, name: &str) -> bool {
    fields.iter().any(|(k, _)| k == name)
}

/// Portal login credentials.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into().trim().to_string(), password: password.into().trim().to_string() }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// The login form as served: hidden fields, post target and credential field names.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub hidden: FormFields,
    pub action: Option<String>,
    pub user_field: Option<String>,
    pub pass_field: Option<String>,
}

/// Hidden inputs of the whole page, with the WebForms postback fields defaulted.
pub fn hidden_fields(html: &str) -> FormFields {
    let document = Html::parse_document(html);
    collect_hidden(document.select(&INPUT))
}

fn collect_hidden<'a>(inputs: impl Iterator<Item = ElementRef<'a>>) -> FormFields {
    let mut fields = FormFields::new();
    for input in inputs {
        let el = input.value();
        let is_hidden = el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
        if let (true, Some(name)) = (is_hidden, el.attr("name").filter(|n| !n.is_empty())) {
            set_field(&mut fields, name, el.attr("value").unwrap_or_default());
        }
    }
    for name in WEBFORMS_FIELDS {
        if !has_field(&fields, name) {
            fields.push((name.to_string(), String::new()));
        }
    }
    fields
}

fn attr_matches_login(form: &ElementRef, attr: &str) -> bool {
    form.value().attr(attr).is_some_and(|v| v.to_lowercase().contains("login"))
}

impl LoginForm {
    pub fn parse(html: &str, origin: &str) -> Self {
        let document = Html::parse_document(html);
        let forms: Vec<ElementRef> = document.select(&FORM).collect();
        let form = forms
            .iter()
            .find(|f| attr_matches_login(f, "id"))
            .or_else(|| forms.iter().find(|f| attr_matches_login(f, "name")))
            .or_else(|| {
                forms
                    .iter()
                    .find(|f| f.value().attr("action").is_some_and(|a| LOGIN_ACTION.is_match(a)))
            })
            .or_else(|| forms.first());

        let inputs: Vec<ElementRef> = match form {
            Some(form) => form.select(&INPUT).collect(),
            None => document.select(&INPUT).collect(),
        };
        let detect = |candidates: &[&str]| {
            inputs
                .iter()
                .filter_map(|i| i.value().attr("name"))
                .find(|name| candidates.contains(name))
                .map(str::to_string)
        };

        Self {
            hidden: collect_hidden(inputs.iter().copied()),
            action: form
                .and_then(|f| f.value().attr("action"))
                .filter(|a| !a.trim().is_empty())
                .map(|a| absolute(origin, a)),
            user_field: detect(USER_FIELDS),
            pass_field: detect(PASS_FIELDS),
        }
    }

    /// Posts the submit button by name, as a browser click does.
    fn button_payload(&self, credentials: &Credentials) -> FormFields {
        let mut payload = self.credential_payload(credentials);
        if !has_field(&payload, SUBMIT_FIELD) {
            payload.push((SUBMIT_FIELD.to_string(), "LOGIN".to_string()));
        }
        payload
    }

    /// Drives the postback through `__EVENTTARGET` instead.
    fn postback_payload(&self, credentials: &Credentials) -> FormFields {
        let mut payload = self.credential_payload(credentials);
        set_field(&mut payload, "__EVENTTARGET", SUBMIT_FIELD);
        payload
    }

    fn credential_payload(&self, credentials: &Credentials) -> FormFields {
        let mut payload = self.hidden.clone();
        set_field(&mut payload, self.user_field.as_deref().unwrap_or(USER_FIELDS[0]), &credentials.username);
        set_field(&mut payload, self.pass_field.as_deref().unwrap_or(PASS_FIELDS[0]), &credentials.password);
        if has_field(&payload, REMEMBER_FIELD) {
            set_field(&mut payload, REMEMBER_FIELD, "on");
        }
        payload
    }
}

fn absolute(origin: &str, path_or_url: &str) -> String {
    if path_or_url.to_lowercase().starts_with("http") {
        path_or_url.to_string()
    } else {
        format!("{}/{}", origin, path_or_url.trim_start_matches('/'))
    }
}

pub fn is_signed_in(html: &str) -> bool {
    SIGNED_IN_MARKERS.iter().any(|m| html.contains(m))
}

/// The portal's inline login error, if the page shows one.
pub fn inline_error(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    if let Some(label) = document.select(&ERROR_LABEL).next() {
        let message = label.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
        if !message.is_empty() {
            return Some(message);
        }
    }
    let page = html.to_lowercase();
    LOGIN_ERROR_NEEDLES.iter().find(|n| page.contains(&n.to_lowercase())).map(|n| n.to_string())
}

/// First product link on a search result page, `&amp;` unescaped.
pub fn extract_product_link(html: &str) -> Option<String> {
    PRODUCT_LINKS
        .iter()
        .find_map(|re| re.captures(html))
        .map(|caps| caps[1].replace("&amp;", "&"))
}

pub struct OrgillSearcher {
    origin: String,
    credentials: Credentials,
    session: OnceCell<()>,
}

impl OrgillSearcher {
    pub fn new(origin: &str, credentials: Credentials) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            credentials,
            session: OnceCell::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        absolute(&self.origin, path)
    }

    fn login_failed(&self, reason: impl Into<String>) -> CollectError {
        CollectError::LoginFailed { vendor: Vendor::Orgill.to_string(), reason: reason.into() }
    }

    /// Logs in on first use; later calls reuse the session.
    pub async fn ensure_login(&self, client: &dyn SiteFetch) -> Result<()> {
        self.session.get_or_try_init(|| self.login(client)).await?;
        Ok(())
    }

    async fn login(&self, client: &dyn SiteFetch) -> Result<()> {
        let home = self.url(HOME_PATH);
        if client.get(&home).await.is_ok_and(|html| is_signed_in(&html)) {
            debug!("Orgill session already signed in");
            return Ok(());
        }

        if !self.credentials.is_complete() {
            return Err(self.login_failed("no credentials configured").into());
        }

        let login_url = self.url(LOGIN_PATH);
        let page = client
            .get(&login_url)
            .await
            .map_err(|e| self.login_failed(format!("login page request failed: {e:#}")))?;
        let form = LoginForm::parse(&page, &self.origin);
        let post_url = form.action.clone().unwrap_or(login_url);

        let mut last_page = String::new();
        for payload in [form.button_payload(&self.credentials), form.postback_payload(&self.credentials)] {
            let response = match client.post_form(&post_url, &payload).await {
                Ok(html) => html,
                Err(e) => {
                    debug!("Orgill login post failed: {:#}", e);
                    continue;
                }
            };
            if is_signed_in(&response) {
                info!("Logged in to Orgill as {}", self.credentials.username);
                return Ok(());
            }

            last_page = match client.get(&home).await {
                Ok(html) if is_signed_in(&html) => {
                    info!("Logged in to Orgill as {}", self.credentials.username);
                    return Ok(());
                }
                _ => response,
            };
        }

        let reason = inline_error(&last_page).unwrap_or_else(|| "no auth cookie or success indicators".to_string());
        Err(self.login_failed(reason).into())
    }

    /// Runs the portal search for a UPC and returns the result page.
    async fn search_page(&self, upc: &str, client: &dyn SiteFetch) -> Option<String> {
        let home = self.url(HOME_PATH);
        let hidden = match client.get(&home).await {
            Ok(html) => hidden_fields(&html),
            Err(e) => {
                debug!("Orgill home page failed: {:#}", e);
                return None;
            }
        };

        for prefix in SEARCH_PREFIXES {
            let mut payload = hidden.clone();
            set_field(&mut payload, "__EVENTTARGET", &format!("{prefix}lvwOrgill$ucPrivateHeader$btnFind"));
            set_field(&mut payload, &format!("{prefix}lvwOrgill$ucPrivateHeader$ddlSearchType"), "Orgill");
            set_field(&mut payload, "txtAdvKeyword1", upc);

            match client.post_form(&home, &payload).await {
                Ok(html) => return Some(html),
                Err(e) => debug!("Orgill search post failed: {:#}", e),
            }
        }

        client.get(&self.url(&format!("/findit?search={upc}"))).await.ok()
    }

    pub async fn find_product_url(&self, upc: &str, client: &dyn SiteFetch) -> Result<Option<String>> {
        let upc = normalize_upc(upc);
        if upc.is_empty() {
            return Ok(None);
        }
        self.ensure_login(client).await?;

        let Some(page) = self.search_page(&upc, client).await else {
            return Ok(None);
        };
        Ok(extract_product_link(&page).map(|link| self.url(&link)))
    }
}

#[async_trait]
impl Locator for OrgillSearcher {
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>> {
        match row.primary_upc() {
            Some(upc) => self.find_product_url(&upc, client).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::testing::MockSite;

    const ORIGIN: &str = "https://www.orgill.com";

    const LOGIN_PAGE: &str = r#"
        <form id="search" action="/search.aspx"><input type="hidden" name="q" value="x"></form>
        <form id="aspnetForm" name="LoginForm" action="/index.aspx?tab=8">
          <input type="hidden" name="__VIEWSTATE" value="vs1">
          <input type="hidden" name="__EVENTVALIDATION" value="ev1">
          <input type="text" name="ctl00$cphMainContent$ctl00$loginOrgillxs$UserName">
          <input type="password" name="ctl00$cphMainContent$ctl00$loginOrgillxs$Password">
          <input type="checkbox" name="ctl00$cphMainContent$ctl00$loginOrgillxs$RememberMe">
        </form>"#;

    const HOME_SIGNED_OUT: &str =
        r#"<form><input type="hidden" name="__VIEWSTATE" value="home-vs"><a href="/index.aspx?tab=8">Log in</a></form>"#;

    fn value<'a>(fields: &'a FormFields, name: &str) -> Option<&'a str> {
        fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn creds() -> Credentials {
        Credentials::new(" dealer ", "secret")
    }

    #[test]
    fn test_parse_login_form() {
        let form = LoginForm::parse(LOGIN_PAGE, ORIGIN);
        assert_eq!(form.action.as_deref(), Some("https://www.orgill.com/index.aspx?tab=8"));
        assert_eq!(form.user_field.as_deref(), Some(USER_FIELDS[0]));
        assert_eq!(form.pass_field.as_deref(), Some(PASS_FIELDS[0]));
        assert_eq!(value(&form.hidden, "__VIEWSTATE"), Some("vs1"));
        assert_eq!(value(&form.hidden, "__EVENTTARGET"), Some(""));
        assert!(value(&form.hidden, "q").is_none());
    }

    #[test]
    fn test_login_payloads() {
        let form = LoginForm::parse(LOGIN_PAGE, ORIGIN);

        let button = form.button_payload(&creds());
        assert_eq!(value(&button, USER_FIELDS[0]), Some("dealer"));
        assert_eq!(value(&button, PASS_FIELDS[0]), Some("secret"));
        assert_eq!(value(&button, SUBMIT_FIELD), Some("LOGIN"));
        assert!(value(&button, REMEMBER_FIELD).is_none());

        let postback = form.postback_payload(&creds());
        assert_eq!(value(&postback, "__EVENTTARGET"), Some(SUBMIT_FIELD));
        assert!(value(&postback, SUBMIT_FIELD).is_none());
    }

    #[test]
    fn test_inline_error() {
        let html = r#"<span id="cphMainContent_lblErrorMessage"> Invalid <b>user</b> </span>"#;
        assert_eq!(inline_error(html).as_deref(), Some("Invalid user"));
        assert_eq!(inline_error("<p>Your password expired</p>").as_deref(), Some("Password Expired"));
        assert!(inline_error("<p>Welcome</p>").is_none());
    }

    #[test]
    fn test_extract_product_link() {
        let html = r#"<a href="/product/abc">x</a><a href="/index.aspx?tab=7&amp;sku=1234567">Hammer</a>"#;
        assert_eq!(extract_product_link(html).as_deref(), Some("/index.aspx?tab=7&sku=1234567"));
        assert_eq!(extract_product_link(r#"<a href="/product/abc">x</a>"#).as_deref(), Some("/product/abc"));
        assert!(extract_product_link("<p>No results</p>").is_none());
    }

    #[tokio::test]
    async fn test_login_then_search() {
        let home = format!("{ORIGIN}/Default.aspx");
        let client = MockSite::new(ORIGIN)
            .page(&home, HOME_SIGNED_OUT)
            .page(&format!("{ORIGIN}/index.aspx?tab=8"), LOGIN_PAGE)
            .form_response(&format!("{ORIGIN}/index.aspx?tab=8"), r#"<a href="/signOut.aspx">Sign Out</a>"#)
            .form_response(&home, r#"<a href="/index.aspx?tab=7&amp;sku=0123456">Claw Hammer</a>"#);

        let searcher = OrgillSearcher::new(ORIGIN, creds());
        let row = InputRow::from_pairs([("upc", "0-12345-67890-5")]);
        assert_eq!(
            searcher.locate(&row, &client).await.unwrap().as_deref(),
            Some("https://www.orgill.com/index.aspx?tab=7&sku=0123456")
        );

        let submitted = client.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(value(&submitted[0].1, "__VIEWSTATE"), Some("vs1"));
        let search = &submitted[1].1;
        assert_eq!(value(search, "__EVENTTARGET"), Some("ctl00$lvwOrgill$ucPrivateHeader$btnFind"));
        assert_eq!(value(search, "txtAdvKeyword1"), Some("012345678905"));
        assert_eq!(value(search, "__VIEWSTATE"), Some("home-vs"));

        // second row reuses the session
        searcher.locate(&row, &client).await.unwrap();
        assert_eq!(client.submitted().len(), 3);
    }

    #[tokio::test]
    async fn test_login_failure_reports_inline_error() {
        let login = format!("{ORIGIN}/index.aspx?tab=8");
        let client = MockSite::new(ORIGIN)
            .page(&format!("{ORIGIN}/Default.aspx"), HOME_SIGNED_OUT)
            .page(&login, LOGIN_PAGE)
            .form_response(&login, "<p>Too many Failed Login Attempts</p>");

        let searcher = OrgillSearcher::new(ORIGIN, creds());
        let err = searcher.find_product_url("012345678905", &client).await.unwrap_err();
        let err = err.downcast_ref::<CollectError>().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "login to orgill failed: Failed Login Attempts");
        assert_eq!(client.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_fatal() {
        let client = MockSite::new(ORIGIN).page(&format!("{ORIGIN}/Default.aspx"), HOME_SIGNED_OUT);
        let searcher = OrgillSearcher::new(ORIGIN, Credentials::default());
        let err = searcher.ensure_login(&client).await.unwrap_err();
        assert!(err.downcast_ref::<CollectError>().is_some_and(CollectError::is_fatal));
    }

    #[tokio::test]
    async fn test_signed_in_session_skips_login() {
        let client = MockSite::new(ORIGIN)
            .page(&format!("{ORIGIN}/Default.aspx"), r#"<a href="/signOut.aspx">Sign Out</a>"#)
            .page(&format!("{ORIGIN}/findit?search=012345678905"), r#"<a href="/product/claw-hammer">Hammer</a>"#);

        let searcher = OrgillSearcher::new(ORIGIN, Credentials::default());
        let url = searcher.find_product_url("012345678905", &client).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://www.orgill.com/product/claw-hammer"));
        assert!(client.requested().iter().all(|u| !u.contains("tab=8")));
    }
}
