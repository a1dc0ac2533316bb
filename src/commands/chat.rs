//! Interactive chat REPL
//!
//! The presentation layer: renders the active path, streams assistant
//! output as it arrives, and maps slash commands onto controller
//! operations. Ctrl-C during a generation triggers cooperative
//! cancellation; the controller then saves the partial text and reloads
//! before control returns here.

use crate::api::ApiClient;
use crate::chat::{ChatSessionController, ConversationTree, Role, StreamEnd};
use crate::config::Config;
use crate::error::Result;
use crate::prefs::PrefsStore;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::future::Future;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Runs the interactive chat session
pub async fn run_chat(
    config: Config,
    resume: Option<String>,
    character: Option<String>,
) -> Result<()> {
    let store = PrefsStore::new()?;
    let mut prefs = store.load();
    if let Some(character) = character {
        prefs.character_id = Some(character);
    }

    let api = ApiClient::new(&config.api.base_url)?;
    let mut controller = ChatSessionController::new(api.clone(), &config, &prefs);

    if let Err(e) = controller.refresh_chats().await {
        eprintln!("{} could not list chats: {}", "warning:".yellow(), e);
    }

    let initial = resume
        .or_else(|| prefs.last_chat_id.clone())
        .or_else(|| controller.chats().first().map(|c| c.chat_id.clone()));
    if let Some(id) = initial {
        if let Err(e) = controller.load_chat(&id).await {
            eprintln!("{} {}", "error:".red(), e);
        }
    }

    print_banner(&controller);
    render_path(&controller);

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(&trimmed);

        if let Some(rest) = trimmed.strip_prefix('/') {
            if !dispatch_command(&mut controller, &api, &mut rl, rest).await? {
                break;
            }
        } else {
            let token = controller.interrupt_token();
            let mut printer = StreamPrinter::new();
            let result = with_interrupt(
                token,
                controller.send_message(&trimmed, Vec::new(), &mut |text| printer.update(text)),
            )
            .await;
            printer.finish();
            report(result);
        }
    }

    prefs.last_chat_id = controller.chat_id().map(str::to_string);
    prefs.model = Some(controller.model().to_string());
    prefs.character_id = controller.character_id().map(str::to_string);
    prefs.gen_args = Some(controller.gen_args().clone());
    store.save(&prefs)?;
    Ok(())
}

/// Races a streaming operation against Ctrl-C
///
/// Cancellation is a request, not an abort: the operation keeps running
/// its save-then-reload sequence after the token fires, so we loop until
/// the future itself resolves.
async fn with_interrupt<F: Future>(token: CancellationToken, fut: F) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "stopping generation...".yellow());
                token.cancel();
            }
        }
    }
}

/// Incremental printer for accumulated stream text
struct StreamPrinter {
    printed: usize,
    started: bool,
}

impl StreamPrinter {
    fn new() -> Self {
        Self {
            printed: 0,
            started: false,
        }
    }

    fn update(&mut self, text: &str) {
        if !self.started {
            print!("{} ", "assistant:".green().bold());
            self.started = true;
        }
        if text.len() >= self.printed {
            print!("{}", &text[self.printed..]);
        } else {
            // Accumulated text shrank (should not happen); reprint whole
            println!();
            print!("{}", text);
        }
        self.printed = text.len();
        let _ = std::io::stdout().flush();
    }

    fn finish(&mut self) {
        if self.started {
            println!();
        }
    }
}

fn report(result: Result<StreamEnd>) {
    match result {
        Ok(StreamEnd::Completed) => {}
        Ok(StreamEnd::Cancelled) => {
            println!("{}", "[stopped; partial response saved]".yellow())
        }
        Ok(StreamEnd::Failed(reason)) => println!("{} {}", "generation failed:".red(), reason),
        Ok(StreamEnd::Rejected) => println!("{}", "nothing to do".dimmed()),
        Err(e) => println!("{} {}", "error:".red(), e),
    }
}

fn print_banner(controller: &ChatSessionController) {
    match controller.chat_id() {
        Some(id) => println!(
            "{} chat {} | model {} | /help for commands",
            "weft".bold(),
            id,
            controller.model()
        ),
        None => println!(
            "{} new chat | model {} | /help for commands",
            "weft".bold(),
            controller.model()
        ),
    }
    if let Some(character) = controller.character_id() {
        println!("{} {}", "character:".dimmed(), character);
    }
}

fn render_path(controller: &ChatSessionController) {
    let info = controller.branch_info();
    for message in controller.active_path() {
        let tag = match message.role {
            Role::User => "user".cyan().bold(),
            Role::Assistant => "assistant".green().bold(),
            Role::System => continue,
        };
        let branch = message
            .parent_id
            .as_deref()
            .and_then(|p| info.get(p))
            .map(|b| format!(" [branch {}/{}]", b.active_index + 1, b.total_branches))
            .unwrap_or_default();
        println!("{} {}{}", tag, format!("({})", message.id).dimmed(), branch.dimmed());
        println!("{}", message.content);
        println!();
    }
}

fn print_help() {
    println!("  /chats                 list chats");
    println!("  /load <chat-id>        open a chat");
    println!("  /new                   start a fresh chat");
    println!("  /branches              show forks in the current chat");
    println!("  /branch <parent> <n>   switch to branch n (1-based) under parent");
    println!("  /regen [--branch] [id] regenerate (last assistant by default)");
    println!("  /continue [id]         continue a response");
    println!("  /edit <id> <text>      replace a message's content");
    println!("  /delete <id>           delete a message and its descendants");
    println!("  /delchat [id]          delete a whole chat (current by default)");
    println!("  /character [id|none]   list or set the active character");
    println!("  /model [name]          show or switch the model");
    println!("  /quit                  exit");
}

/// Executes a slash command; returns false when the REPL should exit
async fn dispatch_command(
    controller: &mut ChatSessionController,
    api: &ApiClient,
    rl: &mut DefaultEditor,
    input: &str,
) -> Result<bool> {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match command {
        "quit" | "q" | "exit" => return Ok(false),
        "help" | "h" => print_help(),
        "new" => {
            controller.close_chat();
            println!("Started a fresh chat; the next message creates it.");
        }
        "chats" => {
            if let Err(e) = controller.refresh_chats().await {
                println!("{} {}", "error:".red(), e);
            }
            for chat in controller.chats() {
                let marker = if controller.chat_id() == Some(chat.chat_id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}  {}",
                    marker,
                    chat.chat_id,
                    super::chats::format_timestamp(chat.timestamp_updated).dimmed(),
                    super::chats::truncate(&chat.preview, 50)
                );
            }
        }
        "load" => match args.first() {
            Some(id) => match controller.load_chat(id).await {
                Ok(()) => {
                    print_banner(controller);
                    render_path(controller);
                }
                Err(e) => println!("{} {}", "error:".red(), e),
            },
            None => println!("usage: /load <chat-id>"),
        },
        "branches" => {
            let tree = ConversationTree::build(controller.messages());
            let info = tree.branch_info();
            if info.is_empty() {
                println!("No branches in this chat.");
            }
            for (parent_id, branch) in &info {
                println!(
                    "{}: {} branches, branch {} active",
                    parent_id,
                    branch.total_branches,
                    branch.active_index + 1
                );
                for (i, child) in tree.children_of(parent_id).iter().enumerate() {
                    let marker = if i == branch.active_index { "*" } else { " " };
                    println!(
                        "  {} {}. ({}) {}",
                        marker,
                        i + 1,
                        child.id,
                        super::chats::truncate(&child.content, 48)
                    );
                }
            }
        }
        "branch" => match (args.first(), args.get(1).and_then(|s| s.parse::<usize>().ok())) {
            (Some(parent_id), Some(n)) if n >= 1 => {
                match controller.set_active_branch(parent_id, n - 1).await {
                    Ok(()) => render_path(controller),
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
            _ => println!("usage: /branch <parent-id> <n>  (n is 1-based)"),
        },
        "regen" => {
            let as_new_branch = args.contains(&"--branch");
            let target = args
                .iter()
                .find(|a| !a.starts_with("--"))
                .map(|s| s.to_string())
                .or_else(|| controller.last_assistant_id());
            match target {
                Some(id) => {
                    let token = controller.interrupt_token();
                    let mut printer = StreamPrinter::new();
                    let result = with_interrupt(
                        token,
                        controller.regenerate_message(&id, as_new_branch, &mut |text| {
                            printer.update(text)
                        }),
                    )
                    .await;
                    printer.finish();
                    report(result);
                    if as_new_branch {
                        render_path(controller);
                    }
                }
                None => println!("No assistant message to regenerate."),
            }
        }
        "continue" => {
            let target = args
                .first()
                .map(|s| s.to_string())
                .or_else(|| controller.last_assistant_id());
            match target {
                Some(id) => {
                    let token = controller.interrupt_token();
                    let mut printer = StreamPrinter::new();
                    let result = with_interrupt(
                        token,
                        controller.continue_message(&id, &mut |text| printer.update(text)),
                    )
                    .await;
                    printer.finish();
                    report(result);
                }
                None => println!("No assistant message to continue."),
            }
        }
        "edit" => match args.split_first() {
            Some((id, rest)) if !rest.is_empty() => {
                let new_text = rest.join(" ");
                match controller.edit_message(id, &new_text).await {
                    Ok(()) => render_path(controller),
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
            _ => println!("usage: /edit <message-id> <new text>"),
        },
        "delete" => match args.first() {
            Some(id) => {
                let prompt = format!("Delete message {} and all its descendants? [y/N] ", id);
                let confirmed = matches!(
                    rl.readline(&prompt).as_deref(),
                    Ok("y") | Ok("Y") | Ok("yes")
                );
                if confirmed {
                    match controller.delete_message(id).await {
                        Ok(()) => render_path(controller),
                        Err(e) => println!("{} {}", "error:".red(), e),
                    }
                }
            }
            None => println!("usage: /delete <message-id>"),
        },
        "delchat" => {
            let target = args
                .first()
                .map(|s| s.to_string())
                .or_else(|| controller.chat_id().map(str::to_string));
            match target {
                Some(id) => {
                    let prompt = format!("Delete chat {} and all its messages? [y/N] ", id);
                    let confirmed = matches!(
                        rl.readline(&prompt).as_deref(),
                        Ok("y") | Ok("Y") | Ok("yes")
                    );
                    if confirmed {
                        match controller.delete_chat(&id).await {
                            Ok(()) => {
                                print_banner(controller);
                                render_path(controller);
                            }
                            Err(e) => println!("{} {}", "error:".red(), e),
                        }
                    }
                }
                None => println!("No chat open; usage: /delchat <chat-id>"),
            }
        }
        "character" => match args.first() {
            Some(&"none") => {
                if let Err(e) = controller.set_active_character(None).await {
                    println!("{} {}", "error:".red(), e);
                }
            }
            Some(id) => {
                let previous = controller.character_id().map(str::to_string);
                if let Err(e) = controller.set_active_character(Some(id.to_string())).await {
                    println!("{} {}", "error:".red(), e);
                    // Selection reverts to the last known-good character
                    println!(
                        "{} {}",
                        "character remains:".dimmed(),
                        previous.as_deref().unwrap_or("none")
                    );
                }
            }
            None => {
                match api.list_characters().await {
                    Ok(characters) => {
                        for character in characters {
                            let marker =
                                if controller.character_id() == Some(character.character_id.as_str())
                                {
                                    "*"
                                } else {
                                    " "
                                };
                            println!("{} {}  {}", marker, character.character_id, character.name);
                        }
                    }
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
        },
        "model" => match args.first() {
            Some(name) => {
                controller.set_model(*name);
                println!("Model set to {}", name);
            }
            None => println!("Model: {}", controller.model()),
        },
        other => println!("Unknown command: /{} (try /help)", other),
    }
    Ok(true)
}
