//! Running a script's API items against a server.
//!
//! A script is a sequence of statements.  Comments of the form
//! `// METHOD PATH [NAME] [DESCRIPTION...]` open an item; statements before
//! the first such comment are the init block.  Inside an item, statements
//! up to the first `assert(...)` call prepare the request and the rest
//! check the response.
//!
//! Variables shared with the script:
//!
//! | Name | Direction | Meaning |
//! |------|-----------|---------|
//! | `baseUrl` | read | prefix for every item path (required) |
//! | `headers` | read | request headers, kept across items |
//! | `query` | read | record appended as a query string |
//! | `post`, `put`, `patch` | read | request body for that method |
//! | `url`, `targetUrl` | written | item path, then the full request URL |
//! | `header`, `status`, `body`, `json` | written | the response |
//!
//! A top-level `import 'file'` statement is replaced by the statements of
//! that file when the script is loaded from disk.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::Config;
use crate::convert::{parse_json, to_json};
use crate::error::{Error, Result};
use crate::fake::{self, Rng};
use crate::http::{is_json_type, parse_url, HttpError, HttpRequest, HttpResponse, Transport};
use crate::output::Output;
use crate::script::{self, Block, Interpreter, Record, ScriptError, StmtKind, Value};

pub const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)>").expect("placeholder pattern is valid"));

// ── Partitioning ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ApiItem {
    /// 1-based position in the script.
    pub index: usize,
    pub method: String,
    pub path: String,
    pub name: String,
    pub description: String,
    pub request: Block,
    pub response: Block,
}

impl ApiItem {
    /// The name, or `METHOD PATH` for unnamed items.
    pub fn title(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub init: Block,
    pub items: Vec<ApiItem>,
}

impl Script {
    pub fn parse(src: &str) -> std::result::Result<Self, ScriptError> {
        Ok(partition(script::parse(src)?))
    }

    /// Read a script file, splicing in its imports.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(partition(load_block(path, &mut Vec::new())?))
    }
}

/// Parse `path` and replace each top-level `import 'file'` with the
/// statements of that file.  Import paths are relative to the importing
/// file.  `stack` holds the files being loaded.
fn load_block(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Block> {
    let canonical = std::fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
    if stack.contains(&canonical) {
        return Err(Error::ImportCycle {
            path: path.to_owned(),
            via: stack.last().cloned().unwrap_or_default(),
        });
    }
    let src = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let block = script::parse(&src).map_err(|source| Error::Script {
        path: path.to_owned(),
        source,
    })?;

    let dir = path.parent().unwrap_or(Path::new(""));
    stack.push(canonical);
    let mut out = Block::with_capacity(block.len());
    for stmt in block {
        match &stmt.kind {
            StmtKind::Import(file) => {
                let target = dir.join(file);
                tracing::debug!(from = %path.display(), import = %target.display(), "splicing import");
                out.extend(load_block(&target, stack)?);
            }
            _ => out.push(stmt),
        }
    }
    stack.pop();
    Ok(out)
}

/// Split a directive comment into `(method, path, name, description)`.
fn directive(comment: &str) -> Option<(String, String, String, String)> {
    let mut words = comment.split_whitespace();
    let method = words.next()?.to_ascii_uppercase();
    if !METHODS.contains(&method.as_str()) {
        return None;
    }
    let path = words.next()?.to_owned();
    let name = words.next().unwrap_or_default().to_owned();
    let description = words.collect::<Vec<_>>().join(" ");
    Some((method, path, name, description))
}

/// Group a parsed script into the init block and its items.
pub fn partition(block: Block) -> Script {
    let mut script = Script::default();
    let mut asserting = false;

    for stmt in block {
        if let Some((method, path, name, description)) = stmt.comment_text().and_then(directive) {
            script.items.push(ApiItem {
                index: script.items.len() + 1,
                method,
                path,
                name,
                description,
                request: Block::new(),
                response: Block::new(),
            });
            asserting = false;
            continue;
        }
        if stmt.is_trivia() {
            continue;
        }
        let Some(item) = script.items.last_mut() else {
            script.init.push(stmt);
            continue;
        };
        if stmt.call_name() == Some("assert") {
            asserting = true;
        }
        if asserting {
            item.response.push(stmt);
        } else {
            item.request.push(stmt);
        }
    }
    tracing::debug!(init = script.init.len(), items = script.items.len(), "script partitioned");
    script
}

// ── Runner ────────────────────────────────────────────────────────────────────

/// Request headers every script starts with.
pub fn default_headers() -> Record {
    let mut headers = Record::new();
    for (name, value) in [
        ("Accept", "*/*"),
        ("Accept-Language", "en-US,en;q=0.8"),
        ("Cache-Control", "max-age=0"),
        ("Content-Type", "application/json"),
    ] {
        headers.insert(name.to_owned(), Value::from(value));
    }
    headers.insert(
        "User-Agent".to_owned(),
        Value::Str(format!("pica/{}", env!("CARGO_PKG_VERSION"))),
    );
    headers
}

pub struct Runner<T> {
    interp: Interpreter,
    transport: T,
    output: Output,
    delay: Duration,
    timeout: Option<Duration>,
}

impl<T: Transport> Runner<T> {
    pub fn new(transport: T, output: Output, config: &Config) -> Result<Self> {
        Self::with_rng(transport, output, config, Rng::from_time())
    }

    /// Like [`Runner::new`] with a fixed fake-data generator.
    pub fn with_rng(transport: T, output: Output, config: &Config, rng: Rng) -> Result<Self> {
        let mut interp = Interpreter::new();
        fake::register(&mut interp, rng)?;

        let mut headers = default_headers();
        for (name, value) in &config.headers {
            headers.insert(name.clone(), Value::from(value.as_str()));
        }
        interp.assign("headers", Value::Record(headers));

        Ok(Self {
            interp,
            transport,
            output,
            delay: config.delay,
            timeout: config.timeout,
        })
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Run the init block, then each selected item in order.  `names`
    /// restricts the run to the items with those names; empty runs all.
    ///
    /// Returns the number of items run.  The first failure stops the run.
    pub async fn run(&mut self, script: &Script, names: &[String]) -> Result<usize> {
        if let Some(missing) = names
            .iter()
            .find(|n| !script.items.iter().any(|item| &item.name == *n))
        {
            return Err(Error::Usage(format!("no item named `{missing}`")));
        }

        self.eval_phase(&script.init)?;

        let selected: Vec<&ApiItem> = script
            .items
            .iter()
            .filter(|item| names.is_empty() || names.contains(&item.name))
            .collect();
        for (n, item) in selected.iter().enumerate() {
            if n > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.run_item(item).await.map_err(|e| Error::Item {
                index: item.index,
                name: item.title(),
                source: Box::new(e),
            })?;
        }
        self.output.summary(selected.len(), script.items.len())?;
        Ok(selected.len())
    }

    #[tracing::instrument(skip_all, fields(index = item.index, method = %item.method, path = %item.path))]
    async fn run_item(&mut self, item: &ApiItem) -> Result<()> {
        self.output.item_banner(item.index, &item.title(), &item.description)?;
        self.interp.assign("url", Value::from(item.path.as_str()));
        self.eval_phase(&item.request)?;

        let request = self.build_request(item)?;
        self.interp.assign("targetUrl", Value::from(request.url.as_str()));
        self.output.request(&request)?;

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(&request))
                .await
                .map_err(|_| HttpError::Timeout(limit.as_millis()))??,
            None => self.transport.send(&request).await?,
        };
        tracing::debug!(status = response.status, "item response");
        self.output.response(&response)?;

        self.bind_response(&response)?;
        self.eval_phase(&item.response)
    }

    /// Run one phase and print whatever it echoed, even on failure.
    fn eval_phase(&mut self, block: &Block) -> Result<()> {
        let result = self.interp.eval_block(block);
        let lines = self.interp.take_output();
        if !lines.is_empty() {
            self.output.script_lines(&lines)?;
        }
        result?;
        Ok(())
    }

    // ── Request assembly ──────────────────────────────────────────────────────

    pub fn build_request(&self, item: &ApiItem) -> Result<HttpRequest> {
        let base = match self.interp.get("baseUrl") {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => {
                return Err(Error::Binding(format!(
                    "`baseUrl` must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(Error::Binding("`baseUrl` is not set".to_owned())),
        };
        let mut url = parse_url(&(base + &self.compile_url(&item.path)?))?;
        let query = self.query_pairs()?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let headers = self.request_headers()?;
        let body = match item.method.as_str() {
            "POST" | "PUT" | "PATCH" => Some(self.request_body(&item.method, &headers)?),
            _ => None,
        };
        Ok(HttpRequest {
            method: item.method.clone(),
            url: url.into(),
            headers,
            body,
        })
    }

    /// Substitute `<name>` placeholders in an item path.
    pub fn compile_url(&self, path: &str) -> Result<String> {
        let mut out = String::with_capacity(path.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(path) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let text = match self.interp.get(name) {
                Some(Value::Str(s)) => s.clone(),
                Some(v @ (Value::Int(_) | Value::Float(_))) => v.to_string(),
                Some(other) => {
                    return Err(Error::Binding(format!(
                        "placeholder <{name}> must be a string or number, got {}",
                        other.type_name()
                    )))
                }
                None => return Err(Error::Binding(format!("placeholder <{name}> is not bound"))),
            };
            out.push_str(&path[last..whole.start()]);
            out.push_str(&text);
            last = whole.end();
        }
        out.push_str(&path[last..]);
        Ok(out)
    }

    fn query_pairs(&self) -> Result<Vec<(String, String)>> {
        let query = match self.interp.get("query") {
            None | Some(Value::Nil) => return Ok(Vec::new()),
            Some(Value::Record(rec)) => rec,
            Some(other) => {
                return Err(Error::Binding(format!(
                    "`query` must be a record, got {}",
                    other.type_name()
                )))
            }
        };
        let mut parts = Vec::with_capacity(query.len());
        for (key, value) in query {
            let text = match value {
                Value::Str(s) => s.clone(),
                Value::Int(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
                Value::Nil => continue,
                other => {
                    return Err(Error::Binding(format!(
                        "query field `{key}` must be a scalar, got {}",
                        other.type_name()
                    )))
                }
            };
            parts.push((key.clone(), text));
        }
        Ok(parts)
    }

    fn request_headers(&self) -> Result<Vec<(String, String)>> {
        let headers = match self.interp.get("headers") {
            None | Some(Value::Nil) => return Ok(Vec::new()),
            Some(Value::Record(rec)) => rec,
            Some(other) => {
                return Err(Error::Binding(format!(
                    "`headers` must be a record, got {}",
                    other.type_name()
                )))
            }
        };
        headers
            .iter()
            .map(|(name, value)| match value {
                Value::Str(s) => Ok((name.clone(), s.clone())),
                Value::Int(n) => Ok((name.clone(), n.to_string())),
                other => Err(Error::Binding(format!(
                    "header `{name}` must be a string or int, got {}",
                    other.type_name()
                ))),
            })
            .collect()
    }

    /// Encode the record bound to the lowercase method name.
    fn request_body(&self, method: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let var = method.to_ascii_lowercase();
        let fields = match self.interp.get(&var) {
            None | Some(Value::Nil) => return Ok(Vec::new()),
            Some(Value::Record(rec)) => rec,
            Some(other) => {
                return Err(Error::Binding(format!(
                    "`{var}` must be a record, got {}",
                    other.type_name()
                )))
            }
        };
        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Type"))
            .map(|(_, v)| v.as_str())
            .unwrap_or("application/json");
        let mime = content_type.split(';').next().unwrap_or_default().trim();

        if is_json_type(mime) {
            let json = to_json(&Value::Record(fields.clone()))?;
            return serde_json::to_vec(&json).map_err(|e| Error::Json(e.to_string()));
        }
        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            let mut pairs = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                let text = match value {
                    Value::Str(s) => s.clone(),
                    Value::Int(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
                    other => {
                        return Err(Error::Binding(format!(
                            "form field `{key}` must be a scalar, got {}",
                            other.type_name()
                        )))
                    }
                };
                pairs.push((key.as_str(), text));
            }
            let form = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            return Ok(form.into_bytes());
        }
        Err(Error::Binding(format!(
            "cannot encode a request body as `{content_type}`"
        )))
    }

    // ── Response binding ──────────────────────────────────────────────────────

    fn bind_response(&mut self, resp: &HttpResponse) -> Result<()> {
        let mut header = Record::new();
        for (name, value) in &resp.headers {
            match header.get_mut(name) {
                Some(Value::Str(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                _ => {
                    header.insert(name.clone(), Value::from(value.as_str()));
                }
            }
        }
        let json = if resp.is_json() {
            parse_json(&resp.body)?
        } else {
            Value::Nil
        };

        self.interp.assign("header", Value::Record(header));
        self.interp.assign("status", Value::Int(i64::from(resp.status)));
        self.interp.assign(
            "body",
            Value::Str(String::from_utf8_lossy(&resp.body).into_owned()),
        );
        self.interp.assign("json", json);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
