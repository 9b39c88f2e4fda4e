use crate::{
    activity::ActivityLog,
    api::WatchtowerApi,
    commands::{self, Command},
    config::Config,
    render,
    session::{AuthManager, FileStore},
    sync::{CheckSummary, Synchronizer, UpdateOutcome, UpdateScope},
    Args,
};
use anyhow::{anyhow, Result};
use rustyline::completion::Completer;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{ColorMode, DefaultEditor, Editor, Helper};
use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::Arc;

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub api: Arc<dyn WatchtowerApi>,
    pub auth: RefCell<AuthManager<FileStore>>,
    pub sync: Synchronizer,
    pub activity: RefCell<ActivityLog>,
    pub tracing: RefCell<bool>,
}

/// What the command loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    LoggedOut,
    Exit,
}

fn trace(ctx: &Context, label: &str, content: &str) {
    if *ctx.tracing.borrow() {
        eprintln!("[TRACE:{}] {}", label, content);
    }
}

fn verbose(ctx: &Context, message: &str) {
    if ctx.args.verbose {
        eprintln!("[VERBOSE] {}", message);
    }
}

/// Activity logging must never break the dashboard
fn record<F: FnOnce(&mut ActivityLog) -> Result<()>>(ctx: &Context, f: F) {
    if let Err(e) = f(&mut ctx.activity.borrow_mut()) {
        eprintln!("Warning: failed to write activity log: {}", e);
    }
}

/// Log in from a remembered token, the command line, or an interactive prompt.
/// `--token` is only honoured when `use_flag_token` is set, so a logout
/// inside the REPL really ends up at the prompt.
/// Returns false if the user gave up.
pub fn login(ctx: &Context, rl: Option<&mut DefaultEditor>, use_flag_token: bool) -> Result<bool> {
    if ctx.auth.borrow_mut().check_login(ctx.api.as_ref()) {
        trace(ctx, "AUTH", "remembered token accepted");
        record(ctx, |log| log.login(true, false, true));
        return Ok(true);
    }

    if let Some(token) = ctx.args.token.as_ref().filter(|_| use_flag_token) {
        let remember = ctx.args.remember;
        let accepted = ctx
            .auth
            .borrow_mut()
            .log_in(ctx.api.as_ref(), token, remember)?;
        record(ctx, |log| log.login(accepted, accepted && remember, false));
        if !accepted {
            return Err(anyhow!("Invalid password."));
        }
        return Ok(true);
    }

    let rl = match rl {
        Some(rl) => rl,
        None => return Err(anyhow!("Not logged in. Pass --token or run interactively.")),
    };

    println!("Please log in to {}", ctx.api_url());
    loop {
        let password = match read_password("Password: ") {
            Ok(line) => line.trim().to_string(),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if password.is_empty() {
            continue;
        }

        let remember = ctx.args.remember || ask_remember(rl)?;
        match ctx
            .auth
            .borrow_mut()
            .log_in(ctx.api.as_ref(), &password, remember)
        {
            Ok(true) => {
                record(ctx, |log| log.login(true, remember, false));
                return Ok(true);
            }
            Ok(false) => {
                record(ctx, |log| log.login(false, false, false));
                println!("Invalid password.");
            }
            Err(e) => {
                record(ctx, |log| log.error("login", &e.to_string()));
                eprintln!("Error: {:#}", e);
            }
        }
    }
}

/// Draws every typed character as `*` so the token never shows on screen
struct PasswordMask;

impl Highlighter for PasswordMask {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

impl Completer for PasswordMask {
    type Candidate = String;
}

impl Hinter for PasswordMask {
    type Hint = String;
}

impl Validator for PasswordMask {}

impl Helper for PasswordMask {}

/// Read a secret on its own editor: masked, and kept out of history
fn read_password(prompt: &str) -> rustyline::Result<String> {
    let mut rl: Editor<PasswordMask, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(PasswordMask));
    // Masking goes through the highlighter, which only runs with colors on
    rl.set_color_mode(ColorMode::Forced);
    rl.set_auto_add_history(false);
    rl.readline(prompt)
}

fn ask_remember(rl: &mut DefaultEditor) -> Result<bool> {
    match rl.readline("Remember me? [y/N] ") {
        Ok(answer) => Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl Context {
    pub fn api_url(&self) -> String {
        self.config.api_url.clone().unwrap_or_default()
    }
}

/// Log in, load the list, run one command and exit
pub fn run_once(ctx: &Context, line: &str) -> Result<()> {
    let command = Command::parse(line)?;
    if !login(ctx, None, true)? {
        return Ok(());
    }
    if command != Command::Refresh {
        refresh(ctx)?;
    }
    execute(ctx, command)?;
    Ok(())
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut first = true;

    loop {
        if !login(&ctx, Some(&mut rl), first)? {
            return Ok(());
        }
        first = false;

        println!("towerdash - type help for commands, exit to quit");
        if let Err(e) = refresh(&ctx) {
            eprintln!("Error: {:#}", e);
        }

        match command_loop(&ctx, &mut rl)? {
            Flow::LoggedOut => continue,
            Flow::Exit | Flow::Continue => return Ok(()),
        }
    }
}

fn command_loop(ctx: &Context, rl: &mut DefaultEditor) -> Result<Flow> {
    loop {
        match rl.readline("towerdash> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                let command = match Command::parse(line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match execute(ctx, command) {
                    Ok(Flow::Continue) => {}
                    Ok(flow) => return Ok(flow),
                    // Transient: the next command may well succeed
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(Flow::Exit),
            Err(e) => {
                eprintln!("Input error: {}", e);
                return Ok(Flow::Exit);
            }
        }
    }
}

fn execute(ctx: &Context, command: Command) -> Result<Flow> {
    trace(ctx, "COMMAND", &format!("{:?}", command));
    match command {
        Command::Refresh => {
            refresh(ctx)?;
        }
        Command::Status => {
            show(ctx);
        }
        Command::Check => {
            check(ctx);
        }
        Command::Select(patterns) => {
            select(ctx, &patterns)?;
        }
        Command::Update(scope) => {
            update(ctx, scope)?;
        }
        Command::Logout => {
            ctx.auth.borrow_mut().log_out()?;
            record(ctx, |log| log.logout());
            println!("Logged out.");
            return Ok(Flow::LoggedOut);
        }
        Command::Trace => {
            let mut t = ctx.tracing.borrow_mut();
            *t = !*t;
            println!("Tracing: {}", if *t { "on" } else { "off" });
        }
        Command::Help => println!("{}", commands::help_text()),
        Command::Exit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}

fn show(ctx: &Context) {
    println!(
        "{}",
        render::dashboard(&ctx.sync.snapshot(), &ctx.config.display)
    );
}

fn refresh(ctx: &Context) -> Result<()> {
    trace(ctx, "LIST", &ctx.api_url());
    match ctx.sync.refresh() {
        Ok(records) => {
            record(ctx, |log| log.refresh(records.len()));
            show(ctx);
            Ok(())
        }
        Err(e) => {
            record(ctx, |log| log.error("list", &e.to_string()));
            if e.is_unauthorized() {
                println!("The token was rejected. Use 'logout' to log in again.");
            }
            Err(e.into())
        }
    }
}

fn report_check(ctx: &Context, summary: &CheckSummary) {
    let failed: Vec<String> = summary.failures.iter().map(|f| f.id.clone()).collect();
    record(ctx, |log| {
        log.check_result(summary.checked, summary.with_updates, &failed)
    });
    for failure in &summary.failures {
        eprintln!("Error: check failed for {}: {}", failure.id, failure.error);
    }
    verbose(
        ctx,
        &format!(
            "checked {}, {} with updates, {} failed",
            summary.checked,
            summary.with_updates,
            summary.failures.len()
        ),
    );
}

fn check(ctx: &Context) {
    let records = ctx.sync.records();
    trace(ctx, "CHECK", &format!("{} containers", records.len()));
    println!("Checking for updates...");
    let summary = ctx.sync.check_all(&records);
    report_check(ctx, &summary);
    show(ctx);
}

fn select(ctx: &Context, patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        let toggled = ctx
            .sync
            .toggle_matching(pattern)
            .map_err(|e| anyhow!("Invalid pattern '{}': {}", pattern, e))?;
        if toggled.is_empty() {
            println!("No container matches '{}'", pattern);
        }
        record(ctx, |log| log.selection(pattern, &toggled));
    }
    show(ctx);
    Ok(())
}

fn update(ctx: &Context, scope: UpdateScope) -> Result<()> {
    let mut progress = |name: &str| {
        println!("Updating {}... please wait", name);
    };
    let outcome = match scope {
        UpdateScope::Selected => ctx.sync.update_selected(&mut progress),
        UpdateScope::All => ctx.sync.update_all(&mut progress),
    };

    match outcome {
        UpdateOutcome::NothingToUpdate => match scope {
            UpdateScope::Selected => println!("No containers selected."),
            UpdateScope::All => println!("No containers with updates. Run 'check' first."),
        },
        UpdateOutcome::Updated {
            requested,
            failures,
            check,
        } => {
            let failed: Vec<String> = failures.iter().map(|f| f.name.clone()).collect();
            record(ctx, |log| log.update_requested(&requested, &failed));
            for failure in &failures {
                eprintln!("Error: update failed for {}: {}", failure.name, failure.error);
            }
            match check {
                Ok(check) => {
                    report_check(ctx, &check);
                    show(ctx);
                }
                Err(e) => {
                    record(ctx, |log| log.error("list", &e.to_string()));
                    return Err(
                        anyhow!(e).context("Updates were requested, but reloading the list failed")
                    );
                }
            }
        }
    }
    Ok(())
}
