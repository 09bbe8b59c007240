//! Human-facing diagnostics on the secondary stream (stderr).
//!
//! Nothing here touches stdout. Styling is decided once by [`OutputStyle`]
//! and passed in, so output is reproducible without touching the environment.

use std::ffi::OsStr;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::aggregate::RunSummary;
use crate::verify::VerifyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputStyle {
    /// ANSI colors.
    pub color: bool,
    /// Interactive extras such as the progress bar.
    pub decorate: bool,
}

impl OutputStyle {
    /// A non-empty `NO_COLOR` disables color; a non-terminal disables both.
    pub fn resolve(no_color: Option<&OsStr>, is_terminal: bool) -> Self {
        let no_color = no_color.is_some_and(|v| !v.is_empty());
        Self {
            color: is_terminal && !no_color,
            decorate: is_terminal,
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var_os("NO_COLOR").as_deref(),
            io::stderr().is_terminal(),
        )
    }

    pub fn plain() -> Self {
        Self {
            color: false,
            decorate: false,
        }
    }
}

struct Palette {
    title: Style,
    heading: Style,
    value: Style,
    dim: Style,
    good: Style,
    bad: Style,
}

impl Palette {
    fn new(color: bool) -> Self {
        let style = |s: Style| s.force_styling(color);
        Self {
            title: style(Style::new().green().bold()),
            heading: style(Style::new().yellow().bold()),
            value: style(Style::new().cyan()),
            dim: style(Style::new().dim()),
            good: style(Style::new().green()),
            bad: style(Style::new().red().bold()),
        }
    }
}

pub struct Reporter<W: Write> {
    out: W,
    style: OutputStyle,
    palette: Palette,
}

impl Reporter<io::Stderr> {
    pub fn stderr(style: OutputStyle) -> Self {
        Self::new(io::stderr(), style)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, style: OutputStyle) -> Self {
        Self {
            out,
            style,
            palette: Palette::new(style.color),
        }
    }

    // Diagnostics are best-effort; a closed stderr must not fail the run.
    fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_all(b"\n");
    }

    pub fn banner(&mut self) {
        let title = self.palette.title.apply_to("sasquat.rr");
        let tagline = self.palette.dim.apply_to(format!(
            "typosquat enumeration + verification ({}/{})",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        self.line(format_args!(""));
        self.line(format_args!("  {title}"));
        self.line(format_args!("  {tagline}"));
        self.line(format_args!(""));
    }

    pub fn run_info(&mut self, domain: &str, config: &VerifyConfig, tlds: &[String]) {
        let heading = self.palette.heading.apply_to("Run configuration");
        let domain = self.palette.value.apply_to(domain);
        self.line(format_args!("{heading}"));
        self.line(format_args!("  Domain:   {domain}"));
        self.line(format_args!("  Workers:  {}", config.workers));
        self.line(format_args!("  TLS:      {}", config.enable_tls));
        self.line(format_args!("  HTTP:     {}", config.enable_http));
        self.line(format_args!("  Timeout:  {:?}", config.probe_timeout));
        if !tlds.is_empty() {
            self.line(format_args!("  TLDs:     {}", tlds.join(",")));
        }
        self.line(format_args!(""));
    }

    pub fn candidates(&mut self, count: usize, strategies: usize) {
        let count = self.palette.value.apply_to(count);
        self.line(format_args!("Generated {count} candidates from {strategies} strategies"));
    }

    pub fn summary(&mut self, summary: &RunSummary, elapsed: Duration) {
        let heading = self.palette.heading.apply_to("Summary");
        let resolved = self.palette.good.apply_to(summary.resolved);
        self.line(format_args!("{heading}"));
        self.line(format_args!("  Probed:    {}", summary.total));
        self.line(format_args!("  Resolved:  {resolved}"));
        self.line(format_args!("  TLS:       {}", summary.tls_reachable));
        self.line(format_args!("  HTTP:      {}", summary.http_reachable));
        self.line(format_args!("  Errors:    {}", summary.errors));
        if summary.cancelled > 0 {
            let cancelled = self.palette.bad.apply_to(summary.cancelled);
            self.line(format_args!("  Cancelled: {cancelled}"));
        }
        self.line(format_args!("  Elapsed:   {:.1}s", elapsed.as_secs_f64()));
    }

    pub fn error(&mut self, err: &dyn fmt::Display) {
        let label = self.palette.bad.apply_to("error:");
        self.line(format_args!("{label} {err}"));
    }

    /// Hidden unless the destination is interactive.
    pub fn progress(&self, len: usize) -> ProgressBar {
        if !self.style.decorate {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::stderr());
        let template = if self.style.color {
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}"
        } else {
            "[{elapsed_precise}] {bar:40} {pos}/{len} {wide_msg}"
        };
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(style: OutputStyle) -> String {
        let mut reporter = Reporter::new(Vec::new(), style);
        reporter.banner();
        reporter.run_info("example.com", &VerifyConfig::default(), &["com".to_string(), "net".to_string()]);
        reporter.summary(
            &RunSummary {
                total: 3,
                resolved: 1,
                cancelled: 2,
                ..Default::default()
            },
            Duration::from_millis(1500),
        );
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn no_color_wins_over_terminal() {
        let style = OutputStyle::resolve(Some(OsStr::new("1")), true);
        assert!(!style.color);
        assert!(style.decorate);
    }

    #[test]
    fn empty_no_color_is_ignored() {
        let style = OutputStyle::resolve(Some(OsStr::new("")), true);
        assert!(style.color);
    }

    #[test]
    fn non_terminal_is_undecorated() {
        assert_eq!(OutputStyle::resolve(None, false), OutputStyle::plain());
    }

    #[test]
    fn plain_output_has_no_escapes() {
        let text = render(OutputStyle::plain());
        assert!(!text.contains('\x1b'));
        assert!(text.contains("Domain:   example.com"));
        assert!(text.contains("TLDs:     com,net"));
        assert!(text.contains("Cancelled: 2"));
        assert!(text.contains("Elapsed:   1.5s"));
    }

    #[test]
    fn colored_output_has_escapes() {
        let text = render(OutputStyle {
            color: true,
            decorate: true,
        });
        assert!(text.contains("\x1b["));
    }

    #[test]
    fn progress_hidden_when_undecorated() {
        let reporter = Reporter::new(Vec::new(), OutputStyle::plain());
        assert!(reporter.progress(10).is_hidden());
    }
}
