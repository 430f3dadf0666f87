// Terminal Front-end
// Renders the session pages on a text console and feeds user input back as events

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::models::{AnalysisResult, ContentKind, ContentPayload, Leaning, Page};
use crate::services::{
    load_payload, ContentAnalyzer, Credentials, FormatCheckAuthenticator, SessionController,
    SessionError,
};

const TEXT_TERMINATOR: &str = ".";
const BACK_COMMAND: &str = ":b";

pub fn render_result(result: &AnalysisResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Verdict:         {}\n", result.verdict));
    if let Some(prob) = result.ai_probability {
        out.push_str(&format!("AI probability:  {:.1}%\n", prob));
    }
    out.push_str(&format!("Confidence:      {:.1}%\n", result.confidence));
    let leaning = match result.leaning() {
        Leaning::Ai => "AI generated",
        Leaning::Human => "human made",
        Leaning::Undetermined => "undetermined",
    };
    out.push_str(&format!("Leaning:         {}\n", leaning));
    if let Some(file) = &result.file {
        out.push_str(&format!("File:            {} ({} bytes)\n", file.name, file.size));
    }
    if let Some(ms) = result.processing_ms {
        out.push_str(&format!("Processing time: {} ms\n", ms));
    }
    if let Some(at) = result.analyzed_at {
        out.push_str(&format!(
            "Analyzed at:     {}\n",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}

pub struct Terminal<R, W> {
    lines: Lines<R>,
    out: W,
}

impl Terminal<BufReader<Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }
}

impl<R: AsyncBufRead + Unpin, W: Write> Terminal<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        write!(self.out, "{}", label)?;
        self.out.flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim_end().to_string()))
    }

    /// Run the page loop until the user quits or input ends.
    pub async fn drive<A: ContentAnalyzer>(
        &mut self,
        mut ctl: SessionController<A>,
        auth: &FormatCheckAuthenticator,
    ) -> anyhow::Result<SessionController<A>> {
        loop {
            let keep_going = match ctl.page() {
                Page::Start => self.login_page(&mut ctl, auth).await?,
                Page::SelectKind => self.dashboard_page(&mut ctl).await?,
                Page::Submit => self.input_page(&mut ctl).await?,
                Page::Pending => {
                    anyhow::bail!("session is waiting on a request this terminal did not start")
                }
                Page::Result => self.result_page(&mut ctl).await?,
                Page::Done => self.thank_you_page(&mut ctl).await?,
            };
            if !keep_going {
                break;
            }
        }
        writeln!(self.out, "Goodbye.")?;
        Ok(ctl)
    }

    async fn login_page<A: ContentAnalyzer>(
        &mut self,
        ctl: &mut SessionController<A>,
        auth: &FormatCheckAuthenticator,
    ) -> anyhow::Result<bool> {
        writeln!(self.out, "\n== Sign in ==")?;
        let Some(email) = self.prompt("Email: ").await? else { return Ok(false) };
        let Some(password) = self.prompt("Password: ").await? else { return Ok(false) };
        let credentials = Credentials::new(email, password);

        for problem in auth.problems(&credentials) {
            writeln!(self.out, "  {}", problem)?;
        }
        match ctl.login_with(auth, &credentials) {
            Ok(()) => writeln!(self.out, "Welcome, {}.", credentials.email.trim())?,
            Err(SessionError::LoginRejected) => writeln!(self.out, "Sign-in failed, try again.")?,
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    async fn dashboard_page<A: ContentAnalyzer>(
        &mut self,
        ctl: &mut SessionController<A>,
    ) -> anyhow::Result<bool> {
        if let Some(err) = ctl.state().last_error.clone() {
            writeln!(self.out, "! {}", err)?;
            writeln!(self.out, "! Error analyzing content. Try again.")?;
        }
        writeln!(self.out, "\n== Dashboard ==")?;
        writeln!(self.out, "  1) Text Detector   - analyze text content for AI generation")?;
        writeln!(self.out, "  2) Image Detector  - detect AI-generated images")?;
        writeln!(self.out, "  3) Video Detector  - analyze video content for AI synthesis")?;
        writeln!(self.out, "  l) Log out   q) Quit")?;

        let Some(choice) = self.prompt("> ").await? else { return Ok(false) };
        let kind = match choice.trim() {
            "1" => Some(ContentKind::Text),
            "2" => Some(ContentKind::Image),
            "3" => Some(ContentKind::Video),
            "l" => {
                ctl.logout()?;
                return Ok(true);
            }
            "q" => return Ok(false),
            other => ContentKind::parse(other),
        };

        match kind {
            Some(kind) => ctl.choose_kind(kind)?,
            None => writeln!(self.out, "Unknown choice {:?}", choice)?,
        }
        Ok(true)
    }

    async fn read_text_block(&mut self) -> anyhow::Result<Option<String>> {
        writeln!(
            self.out,
            "Paste or type your content. End with a line containing only '{}' ('{}' goes back).",
            TEXT_TERMINATOR, BACK_COMMAND
        )?;
        let mut collected: Vec<String> = Vec::new();
        loop {
            match self.lines.next_line().await? {
                Some(line) if collected.is_empty() && line.trim() == BACK_COMMAND => {
                    return Ok(Some(BACK_COMMAND.to_string()))
                }
                Some(line) if line.trim() == TEXT_TERMINATOR => break,
                Some(line) => collected.push(line),
                None if collected.is_empty() => return Ok(None),
                None => break,
            }
        }
        Ok(Some(collected.join("\n")))
    }

    async fn input_page<A: ContentAnalyzer>(
        &mut self,
        ctl: &mut SessionController<A>,
    ) -> anyhow::Result<bool> {
        let Some(kind) = ctl.state().submission.as_ref().map(|s| s.kind) else {
            ctl.back()?;
            return Ok(true);
        };
        writeln!(self.out, "\n== {} analysis ==", kind)?;

        let payload = if kind == ContentKind::Text {
            match self.read_text_block().await? {
                None => return Ok(false),
                Some(cmd) if cmd == BACK_COMMAND => {
                    ctl.back()?;
                    return Ok(true);
                }
                Some(text) => ContentPayload::Text(text),
            }
        } else {
            let label = format!("Path to the {} file ('{}' goes back): ", kind, BACK_COMMAND);
            let Some(path) = self.prompt(&label).await? else { return Ok(false) };
            let path = path.trim();
            if path == BACK_COMMAND {
                ctl.back()?;
                return Ok(true);
            }
            match load_payload(std::path::Path::new(path), kind) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(path, error = %e, "terminal.read_failed");
                    writeln!(self.out, "Could not read {}: {}", path, e)?;
                    return Ok(true);
                }
            }
        };

        if let Err(e) = ctl.set_payload(payload) {
            writeln!(self.out, "{}", e)?;
            return Ok(true);
        }

        writeln!(self.out, "Analyzing...")?;
        self.out.flush()?;
        match ctl.submit_analysis().await {
            Ok(_) | Err(SessionError::Analysis(_)) => {}
            Err(SessionError::Validation(e)) => writeln!(self.out, "{}", e)?,
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    async fn result_page<A: ContentAnalyzer>(
        &mut self,
        ctl: &mut SessionController<A>,
    ) -> anyhow::Result<bool> {
        writeln!(self.out, "\n== Result ==")?;
        if let Some(result) = ctl.state().result.as_ref() {
            write!(self.out, "{}", render_result(result))?;
        }
        writeln!(self.out, "  a) Analyze another   c) Continue")?;

        let Some(choice) = self.prompt("> ").await? else { return Ok(false) };
        match choice.trim() {
            "a" => ctl.analyze_another()?,
            "c" => ctl.proceed()?,
            other => writeln!(self.out, "Unknown choice {:?}", other)?,
        }
        Ok(true)
    }

    async fn thank_you_page<A: ContentAnalyzer>(
        &mut self,
        ctl: &mut SessionController<A>,
    ) -> anyhow::Result<bool> {
        writeln!(self.out, "\n== Thank you for using detectAI ==")?;
        writeln!(self.out, "  b) Back to dashboard   l) Log out   q) Quit")?;

        let Some(choice) = self.prompt("> ").await? else { return Ok(false) };
        match choice.trim() {
            "b" => ctl.back_to_dashboard()?,
            "l" => ctl.logout()?,
            "q" => return Ok(false),
            other => writeln!(self.out, "Unknown choice {:?}", other)?,
        }
        Ok(true)
    }
}
