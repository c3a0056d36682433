//! [`WikibaseClient`]: the item writer for a Wikibase instance.
//!
//! Talks to the MediaWiki action API: bot-password login, a CSRF token, and
//! `wbeditentity` for both items and properties. Replacing statements reads
//! the item with `wbgetentities` first and removes the old statements in the
//! same edit.

use std::{collections::BTreeSet, time::Duration};

use reqwest::Client;
use serde_json::{Value as Json, json};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use wikiparl_core::{
  claim::{Claim, ClaimValue},
  identity::{ItemId, PropertyId},
  mapping::ValueKind,
  writer::{ItemWriter, Registration, WriteMode},
};

/// Gregorian calendar, the only calendar model the importer writes.
const GREGORIAN: &str = "http://www.wikidata.org/entity/Q1985727";
const LABEL_CONFLICT: &str = "wikibase-validator-label-conflict";
const LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum WikibaseError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("login failed: {0}")]
  Login(String),

  #[error("api error {code}: {info}")]
  Api { code: String, info: String },

  #[error("response without entity id")]
  MissingEntityId,

  #[error(transparent)]
  Core(#[from] wikiparl_core::Error),
}

#[derive(Debug, Clone)]
pub struct WikibaseConfig {
  pub api_url:  String,
  pub username: String,
  pub password: String,
  pub timeout:  Duration,
}

pub struct WikibaseClient {
  client: Client,
  config: WikibaseConfig,
  csrf:   Mutex<Option<String>>,
}

impl WikibaseClient {
  pub fn new(config: WikibaseConfig) -> Result<Self, WikibaseError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .cookie_store(true)
      .user_agent(concat!("wikiparl/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, config, csrf: Mutex::new(None) })
  }

  /// Log in with the bot password and fetch a CSRF token.
  pub async fn login(&self) -> Result<(), WikibaseError> {
    let tokens = self.get(&[("action", "query"), ("meta", "tokens"), ("type", "login")]).await?;
    let login_token = token(&tokens, "logintoken")?;

    let response = self
      .post(&[
        ("action", "login"),
        ("lgname", self.config.username.as_str()),
        ("lgpassword", self.config.password.as_str()),
        ("lgtoken", login_token.as_str()),
      ])
      .await?;
    match response["login"]["result"].as_str() {
      Some("Success") => {}
      other => {
        let reason = response["login"]["reason"].as_str().or(other).unwrap_or("no result");
        return Err(WikibaseError::Login(reason.to_owned()));
      }
    }

    self.refresh_csrf().await?;
    info!(user = %self.config.username, "logged in to wikibase");
    Ok(())
  }

  async fn refresh_csrf(&self) -> Result<String, WikibaseError> {
    let tokens = self.get(&[("action", "query"), ("meta", "tokens")]).await?;
    let csrf = token(&tokens, "csrftoken")?;
    *self.csrf.lock().await = Some(csrf.clone());
    Ok(csrf)
  }

  async fn csrf(&self) -> Result<String, WikibaseError> {
    let cached = self.csrf.lock().await.clone();
    match cached {
      Some(token) => Ok(token),
      None => self.refresh_csrf().await,
    }
  }

  async fn get(&self, params: &[(&str, &str)]) -> Result<Json, WikibaseError> {
    let response = self
      .client
      .get(&self.config.api_url)
      .query(params)
      .query(&[("format", "json")])
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }

  async fn post(&self, params: &[(&str, &str)]) -> Result<Json, WikibaseError> {
    let mut form: Vec<(&str, &str)> = params.to_vec();
    form.push(("format", "json"));
    let response = self
      .client
      .post(&self.config.api_url)
      .form(&form)
      .send()
      .await?
      .error_for_status()?;
    Ok(response.json().await?)
  }

  /// Current statements of `item`, keyed by property.
  async fn statements(&self, item: &ItemId) -> Result<Json, WikibaseError> {
    let response = self
      .get(&[("action", "wbgetentities"), ("ids", item.as_str()), ("props", "claims")])
      .await?;
    if let Some(e) = api_error(&response) {
      return Err(e);
    }
    Ok(response["entities"][item.as_str()]["claims"].clone())
  }

  /// `wbeditentity`, retried once with a fresh token if the token expired.
  async fn edit_entity(&self, target: (&str, &str), data: &Json) -> Result<Json, WikibaseError> {
    let data = data.to_string();
    let mut retried = false;
    loop {
      let csrf = self.csrf().await?;
      let response = self
        .post(&[
          ("action", "wbeditentity"),
          target,
          ("data", data.as_str()),
          ("token", csrf.as_str()),
          ("bot", "1"),
        ])
        .await?;

      match api_error(&response) {
        Some(WikibaseError::Api { code, .. }) if code == "badtoken" && !retried => {
          debug!("csrf token expired, refreshing");
          self.refresh_csrf().await?;
          retried = true;
        }
        Some(e) => return Err(e),
        None => return Ok(response),
      }
    }
  }
}

impl ItemWriter for WikibaseClient {
  type Error = WikibaseError;

  async fn write(
    &self,
    item: Option<&ItemId>,
    claims: &[Claim],
    label: &str,
    mode: WriteMode,
  ) -> Result<ItemId, WikibaseError> {
    let response = match (item, mode) {
      (None, _) => self.edit_entity(("new", "item"), &item_data(claims, Some(label))).await?,
      (Some(id), WriteMode::Append) => {
        self.edit_entity(("id", id.as_str()), &item_data(claims, None)).await?
      }
      (Some(id), WriteMode::Replace) => {
        let existing = self.statements(id).await?;
        let mut data = item_data(claims, None);
        if let Some(statements) = data["claims"].as_array_mut() {
          statements.extend(removals(claims, &existing));
        }
        self.edit_entity(("id", id.as_str()), &data).await?
      }
    };
    entity_id(&response).map(ItemId)
  }

  async fn register_property(&self, name: &str, kind: ValueKind) -> Result<Registration, WikibaseError> {
    let data = json!({
      "labels": { LANGUAGE: { "language": LANGUAGE, "value": name } },
      "datatype": datatype(kind),
    });

    match self.edit_entity(("new", "property"), &data).await {
      Ok(response) => Ok(Registration::Created(PropertyId(entity_id(&response)?))),
      Err(WikibaseError::Api { code, info }) => match conflicting_property(&code, &info) {
        Some(existing) => Ok(Registration::Existing(existing)),
        None if is_label_conflict(&info) => {
          Err(wikiparl_core::Error::MappingConflict { field: name.to_owned() }.into())
        }
        None => Err(WikibaseError::Api { code, info }),
      },
      Err(e) => Err(e),
    }
  }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

fn datatype(kind: ValueKind) -> &'static str {
  match kind {
    ValueKind::Text => "string",
    ValueKind::Url => "url",
    ValueKind::CrossReference => "wikibase-item",
    ValueKind::Timestamp => "time",
  }
}

/// The `data` parameter of `wbeditentity` for an item.
fn item_data(claims: &[Claim], label: Option<&str>) -> Json {
  let mut data = json!({ "claims": claims.iter().map(statement).collect::<Vec<_>>() });
  if let Some(label) = label {
    data["labels"] = json!({ LANGUAGE: { "language": LANGUAGE, "value": label } });
  }
  data
}

/// Removal entries for every existing statement of a property in `claims`.
fn removals(claims: &[Claim], existing: &Json) -> Vec<Json> {
  let written: BTreeSet<&str> = claims.iter().map(|c| c.property.as_str()).collect();
  written
    .into_iter()
    .flat_map(|property| existing[property].as_array().into_iter().flatten())
    .filter_map(|statement| statement["id"].as_str())
    .map(|id| json!({ "id": id, "remove": "" }))
    .collect()
}

fn statement(claim: &Claim) -> Json {
  json!({
    "mainsnak": {
      "snaktype": "value",
      "property": claim.property.as_str(),
      "datavalue": datavalue(&claim.value),
    },
    "type": "statement",
    "rank": "normal",
  })
}

fn datavalue(value: &ClaimValue) -> Json {
  match value {
    ClaimValue::Text(s) | ClaimValue::Url(s) => json!({ "value": s, "type": "string" }),
    ClaimValue::Item(item) => {
      let numeric = item.as_str().trim_start_matches('Q').parse::<u64>().ok();
      json!({
        "value": { "entity-type": "item", "numeric-id": numeric, "id": item.as_str() },
        "type": "wikibase-entityid",
      })
    }
    ClaimValue::Time { time, precision } => json!({
      "value": {
        "time": time,
        "timezone": 0,
        "before": 0,
        "after": 0,
        "precision": precision,
        "calendarmodel": GREGORIAN,
      },
      "type": "time",
    }),
  }
}

fn token(response: &Json, name: &str) -> Result<String, WikibaseError> {
  response["query"]["tokens"][name]
    .as_str()
    .map(str::to_owned)
    .ok_or_else(|| WikibaseError::Login(format!("no {name} in response")))
}

fn entity_id(response: &Json) -> Result<String, WikibaseError> {
  response["entity"]["id"]
    .as_str()
    .map(str::to_owned)
    .ok_or(WikibaseError::MissingEntityId)
}

/// Turn an `error` object into [`WikibaseError::Api`]. The `messages` are
/// folded into `info` so conflicts can be inspected later.
fn api_error(response: &Json) -> Option<WikibaseError> {
  let error = response.get("error")?;
  let code = error["code"].as_str().unwrap_or("unknown").to_owned();
  let mut info = error["info"].as_str().unwrap_or_default().to_owned();
  if let Some(messages) = error["messages"].as_array() {
    for message in messages {
      info.push('\n');
      info.push_str(message["name"].as_str().unwrap_or_default());
      for param in message["parameters"].as_array().into_iter().flatten() {
        info.push(' ');
        info.push_str(param.as_str().unwrap_or_default());
      }
    }
  }
  Some(WikibaseError::Api { code, info })
}

fn is_label_conflict(info: &str) -> bool { info.contains(LABEL_CONFLICT) }

/// The id of the property whose label clashed, from a conflict's
/// `[[Property:P12|P12]]` parameter.
fn conflicting_property(code: &str, info: &str) -> Option<PropertyId> {
  if code != "modification-failed" || !is_label_conflict(info) {
    return None;
  }
  let link = info.split_whitespace().find(|p| p.starts_with("[[Property:"))?;
  let id = link.rsplit('|').next()?.trim_end_matches("]]");
  let valid = id.starts_with('P') && id.len() > 1 && id[1..].chars().all(|c| c.is_ascii_digit());
  valid.then(|| PropertyId::from(id))
}

#[cfg(test)]
mod tests {
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, query_param},
  };

  use super::*;

  const API: &str = "/w/api.php";

  fn client(server: &MockServer) -> WikibaseClient {
    WikibaseClient::new(WikibaseConfig {
      api_url:  format!("{}{API}", server.uri()),
      username: "Importer@bot".into(),
      password: "secret".into(),
      timeout:  Duration::from_secs(5),
    })
    .unwrap()
  }

  fn ok(body: Json) -> ResponseTemplate { ResponseTemplate::new(200).set_body_json(body) }

  fn tokens(name: &str, value: &str) -> Json { json!({ "query": { "tokens": { name: value } } }) }

  fn name_claim() -> Vec<Claim> {
    vec![Claim::new(PropertyId::from("P2"), ClaimValue::Text("Ada".into()))]
  }

  async fn mount_csrf(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
      .and(query_param("meta", "tokens"))
      .respond_with(ok(tokens("csrftoken", token)))
      .mount(server)
      .await;
  }

  fn edit() -> wiremock::MockBuilder {
    Mock::given(method("POST")).and(body_string_contains("action=wbeditentity"))
  }

  async fn edit_bodies(server: &MockServer) -> Vec<String> {
    server
      .received_requests()
      .await
      .unwrap_or_default()
      .into_iter()
      .map(|r| String::from_utf8_lossy(&r.body).into_owned())
      .filter(|body| body.contains("action=wbeditentity"))
      .collect()
  }

  fn conflict_response() -> Json {
    json!({
      "error": {
        "code": "modification-failed",
        "info": "Property P12 already has label \"name\" associated with language code en.",
        "messages": [{
          "name": "wikibase-validator-label-conflict",
          "parameters": ["name", "en", "[[Property:P12|P12]]"],
        }],
      },
    })
  }

  #[test]
  fn label_conflict_yields_existing_property() {
    let Some(WikibaseError::Api { code, info }) = api_error(&conflict_response()) else {
      panic!("expected an api error");
    };
    assert_eq!(conflicting_property(&code, &info), Some(PropertyId::from("P12")));
  }

  #[test]
  fn other_errors_are_not_conflicts() {
    let response = json!({ "error": { "code": "badtoken", "info": "Invalid CSRF token." } });
    let Some(WikibaseError::Api { code, info }) = api_error(&response) else {
      panic!("expected an api error");
    };
    assert_eq!(code, "badtoken");
    assert_eq!(conflicting_property(&code, &info), None);
    assert!(api_error(&json!({ "entity": { "id": "Q1" } })).is_none());
  }

  #[test]
  fn statements_by_value_kind() {
    let time = statement(&Claim::new(PropertyId::from("P5"), ClaimValue::Time {
      time:      "+2016-05-03T00:00:00Z".into(),
      precision: 11,
    }));
    assert_eq!(time["mainsnak"]["property"], "P5");
    assert_eq!(time["mainsnak"]["datavalue"]["value"]["precision"], 11);
    assert_eq!(time["mainsnak"]["datavalue"]["type"], "time");

    let item = datavalue(&ClaimValue::Item(ItemId::from("Q42")));
    assert_eq!(item["value"]["numeric-id"], 42);
    assert_eq!(item["type"], "wikibase-entityid");

    let url = datavalue(&ClaimValue::Url("https://example.org".into()));
    assert_eq!(url, json!({ "value": "https://example.org", "type": "string" }));
  }

  #[test]
  fn only_new_items_get_a_label() {
    let claims = [Claim::new(PropertyId::from("P2"), ClaimValue::Text("Ada".into()))];
    let created = item_data(&claims, Some("https://example.org/person/1"));
    let updated = item_data(&claims, None);

    assert_eq!(created["labels"]["en"]["value"], "https://example.org/person/1");
    assert!(updated.get("labels").is_none());
    assert_eq!(updated["claims"].as_array().map(Vec::len), Some(1));
  }

  #[test]
  fn replacing_removes_only_written_properties() {
    let existing = json!({
      "P2": [{ "id": "Q7$a" }, { "id": "Q7$b" }],
      "P9": [{ "id": "Q7$c" }],
    });

    let removed = removals(&name_claim(), &existing);

    assert_eq!(removed, vec![
      json!({ "id": "Q7$a", "remove": "" }),
      json!({ "id": "Q7$b", "remove": "" }),
    ]);
    assert!(removals(&name_claim(), &json!(null)).is_empty());
  }

  #[tokio::test]
  async fn login_then_create_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(query_param("type", "login"))
      .respond_with(ok(tokens("logintoken", "L1")))
      .with_priority(1)
      .expect(1)
      .mount(&server)
      .await;
    mount_csrf(&server, "C1").await;
    Mock::given(method("POST"))
      .and(body_string_contains("action=login"))
      .and(body_string_contains("lgtoken=L1"))
      .respond_with(ok(json!({ "login": { "result": "Success" } })))
      .expect(1)
      .mount(&server)
      .await;
    edit()
      .and(body_string_contains("new=item"))
      .and(body_string_contains("token=C1"))
      .respond_with(ok(json!({ "entity": { "id": "Q7" } })))
      .expect(1)
      .mount(&server)
      .await;

    let client = client(&server);
    client.login().await.unwrap();
    let item = client.write(None, &name_claim(), "https://example.org/person/1", WriteMode::Replace).await;

    assert_eq!(item.unwrap(), ItemId::from("Q7"));
  }

  #[tokio::test]
  async fn failed_login_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(query_param("type", "login"))
      .respond_with(ok(tokens("logintoken", "L1")))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(body_string_contains("action=login"))
      .respond_with(ok(json!({ "login": { "result": "Failed", "reason": "Incorrect password" } })))
      .mount(&server)
      .await;

    let error = client(&server).login().await.unwrap_err();

    assert!(matches!(error, WikibaseError::Login(reason) if reason == "Incorrect password"));
  }

  #[tokio::test]
  async fn expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(query_param("meta", "tokens"))
      .respond_with(ok(tokens("csrftoken", "C1")))
      .with_priority(1)
      .up_to_n_times(1)
      .mount(&server)
      .await;
    mount_csrf(&server, "C2").await;
    edit()
      .and(body_string_contains("token=C1"))
      .respond_with(ok(json!({ "error": { "code": "badtoken", "info": "Invalid CSRF token." } })))
      .expect(1)
      .mount(&server)
      .await;
    edit()
      .and(body_string_contains("token=C2"))
      .respond_with(ok(json!({ "entity": { "id": "Q7" } })))
      .expect(1)
      .mount(&server)
      .await;

    let item = client(&server).write(None, &name_claim(), "label", WriteMode::Replace).await;

    assert_eq!(item.unwrap(), ItemId::from("Q7"));
  }

  #[tokio::test]
  async fn second_bad_token_is_an_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "C1").await;
    edit()
      .respond_with(ok(json!({ "error": { "code": "badtoken", "info": "Invalid CSRF token." } })))
      .expect(2)
      .mount(&server)
      .await;

    let error = client(&server).write(None, &name_claim(), "label", WriteMode::Replace).await;

    assert!(matches!(error, Err(WikibaseError::Api { code, .. }) if code == "badtoken"));
  }

  #[tokio::test]
  async fn label_conflict_over_http_reuses_property() {
    let server = MockServer::start().await;
    mount_csrf(&server, "C1").await;
    edit()
      .and(body_string_contains("new=property"))
      .respond_with(ok(conflict_response()))
      .expect(1)
      .mount(&server)
      .await;

    let registration = client(&server).register_property("name", ValueKind::Text).await.unwrap();

    assert_eq!(registration, Registration::Existing(PropertyId::from("P12")));
  }

  #[tokio::test]
  async fn replace_sends_removals_for_old_statements() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(query_param("action", "wbgetentities"))
      .and(query_param("ids", "Q7"))
      .respond_with(ok(json!({
        "entities": { "Q7": { "claims": {
          "P2": [{ "id": "Q7$old-name" }],
          "P9": [{ "id": "Q7$other" }],
        } } },
      })))
      .expect(1)
      .mount(&server)
      .await;
    mount_csrf(&server, "C1").await;
    edit()
      .and(body_string_contains("id=Q7"))
      .respond_with(ok(json!({ "entity": { "id": "Q7" } })))
      .expect(1)
      .mount(&server)
      .await;

    let item = ItemId::from("Q7");
    client(&server).write(Some(&item), &name_claim(), "label", WriteMode::Replace).await.unwrap();

    let bodies = edit_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("Q7%24old-name"));
    assert!(!bodies[0].contains("Q7%24other"));
    assert!(!bodies[0].contains("labels"));
  }

  #[tokio::test]
  async fn append_does_not_read_the_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(query_param("action", "wbgetentities"))
      .respond_with(ok(json!({ "entities": {} })))
      .expect(0)
      .mount(&server)
      .await;
    mount_csrf(&server, "C1").await;
    edit()
      .respond_with(ok(json!({ "entity": { "id": "Q7" } })))
      .expect(1)
      .mount(&server)
      .await;

    let item = ItemId::from("Q7");
    let written = client(&server).write(Some(&item), &name_claim(), "label", WriteMode::Append).await;

    assert_eq!(written.unwrap(), item);
    assert!(!edit_bodies(&server).await[0].contains("remove"));
  }
}
