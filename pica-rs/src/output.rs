//! Console rendering of requests, responses and script output.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Color, ContentStyle, Print, ResetColor, SetStyle, Stylize};

use crate::config::ColorMode;
use crate::http::{HttpRequest, HttpResponse};

const RULE_WIDTH: usize = 60;

/// Whether stdout is attached to a terminal.
pub fn stdout_is_tty() -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// Resolve a [`ColorMode`] against the actual stdout.
pub fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => stdout_is_tty(),
    }
}

/// Styled, line-oriented writer.  With color off every style is dropped and
/// the text is written as-is.
pub struct Output {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl Output {
    pub fn new(out: impl Write + Send + 'static, color: bool) -> Self {
        Self {
            out: Box::new(out),
            color,
        }
    }

    pub fn stdout(mode: ColorMode) -> Self {
        Self::new(io::stdout(), use_color(mode))
    }

    // ── Low-level ─────────────────────────────────────────────────────────────

    fn styled(&mut self, text: &str, style: ContentStyle) -> io::Result<()> {
        if self.color {
            queue!(self.out, SetStyle(style), Print(text), ResetColor)
        } else {
            self.out.write_all(text.as_bytes())
        }
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    fn headers(&mut self, headers: &[(String, String)]) -> io::Result<()> {
        for (name, value) in headers {
            self.styled(name, ContentStyle::new().cyan())?;
            self.line(&format!(": {value}"))?;
        }
        Ok(())
    }

    fn body(&mut self, body: &[u8], json: bool) -> io::Result<()> {
        if body.is_empty() {
            return Ok(());
        }
        let text = if json {
            pretty_json(body)
        } else {
            String::from_utf8_lossy(body).into_owned()
        };
        self.out.write_all(b"\n")?;
        self.line(text.trim_end())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    // ── Sections ──────────────────────────────────────────────────────────────

    /// Banner naming the item about to run.
    pub fn item_banner(&mut self, index: usize, title: &str, description: &str) -> io::Result<()> {
        let heading = format!("#{index} {title}");
        let fill = RULE_WIDTH.saturating_sub(heading.chars().count() + 4);
        self.styled(&format!("── {heading} {}", "─".repeat(fill)), ContentStyle::new().bold())?;
        self.out.write_all(b"\n")?;
        if !description.is_empty() {
            self.styled(description, ContentStyle::new().dark_grey())?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn request(&mut self, req: &HttpRequest) -> io::Result<()> {
        self.styled(&req.method, ContentStyle::new().bold().yellow())?;
        self.line(&format!(" {}", req.url))?;
        self.headers(&req.headers)?;
        let json = req
            .headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("Content-Type") && crate::http::is_json_type(v));
        self.body(req.body.as_deref().unwrap_or_default(), json)?;
        self.flush()
    }

    pub fn response(&mut self, resp: &HttpResponse) -> io::Result<()> {
        self.out.write_all(b"\n")?;
        let color = if (200..300).contains(&resp.status) {
            Color::Green
        } else {
            Color::Red
        };
        self.line("Response")?;
        self.styled(
            &format!("Status: {} {}", resp.status, resp.reason).trim_end().to_owned(),
            ContentStyle::new().bold().with(color),
        )?;
        self.out.write_all(b"\n")?;
        self.headers(&resp.headers)?;
        self.body(&resp.body, resp.is_json())?;
        self.flush()
    }

    /// Lines printed by the script's `echo`/`echoln`.
    pub fn script_lines(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.styled("> ", ContentStyle::new().dark_grey())?;
            self.line(line)?;
        }
        self.flush()
    }

    pub fn summary(&mut self, ran: usize, total: usize) -> io::Result<()> {
        self.out.write_all(b"\n")?;
        let text = format!("{ran} of {total} item(s) passed");
        self.styled(&text, ContentStyle::new().bold().green())?;
        self.out.write_all(b"\n")?;
        self.flush()
    }
}

/// Re-indent a JSON body; anything unparsable is returned as lossy text.
pub fn pretty_json(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
