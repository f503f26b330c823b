//! A simple program demonstrates how to use `bellhop` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use bellhop::SessionBuilder;
use bellhop::core::Generator;
use bellhop::model::{Prompt, StreamResponse};
use bellhop::openai::{OpenAIConfigBuilder, OpenAIProvider};
use bellhop::stream::wire;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::{select, signal};
use tokio_util::sync::CancellationToken;

const BAR_CHAR: &str = "▎";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Runs the agent loop with tools.
    Agent,
    /// Streams text deltas without tools.
    Stream,
    /// Prints the re-emitted stream frames.
    Sse,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    let model =
        env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
    let mode = match env::var("BELLHOP_STREAM").as_deref() {
        Ok("sse") => Mode::Sse,
        Ok(_) => Mode::Stream,
        Err(_) => Mode::Agent,
    };

    let provider = OpenAIProvider::new(config.build());
    let mut session = SessionBuilder::with_prompter(provider, model)
        .with_system_prompt(
            include_str!("./system_prompt.md")
                .replace("{{HOST_OS}}", host_os()),
        )
        .build();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cancel = CancellationToken::new();
        match mode {
            Mode::Agent => {
                let reply = {
                    let progress_bar = spinner();
                    let reply = session.send_message(line, &cancel);
                    let reply = cancel_on_ctrl_c(reply, &cancel).await;
                    progress_bar.finish_and_clear();
                    reply
                };
                match reply {
                    Ok(reply) => {
                        println!(
                            "{}🤖 {}",
                            BAR_CHAR.bright_cyan(),
                            reply.text.bright_white()
                        );
                        println!(
                            "{}",
                            format!(
                                "{} tokens, {} tool rounds",
                                reply.metadata.total_tokens, reply.depth
                            )
                            .dimmed()
                        );
                    }
                    Err(err) => print_error(&err),
                }
            }
            Mode::Stream | Mode::Sse => {
                let generator = session
                    .generator()
                    .set_tools([])
                    .with_cancellation(cancel.clone());
                let streamed = stream_reply(&generator, line, mode == Mode::Sse);
                cancel_on_ctrl_c(streamed, &cancel).await;
            }
        }
        println!();
    }
}

async fn cancel_on_ctrl_c<F: Future>(
    fut: F,
    cancel: &CancellationToken,
) -> F::Output {
    let mut fut = std::pin::pin!(fut);
    loop {
        select! {
            output = &mut fut => return output,
            _ = signal::ctrl_c(), if !cancel.is_cancelled() => {
                warn!("cancelling the request");
                cancel.cancel();
            }
        }
    }
}

async fn stream_reply(generator: &Generator, line: &str, raw: bool) {
    let mut rx = match generator.stream(&[Prompt::user(line)]).await {
        Ok(rx) => rx,
        Err(err) => {
            print_error(&err);
            return;
        }
    };

    if !raw {
        print!("{}🤖 ", BAR_CHAR.bright_cyan());
    }
    while let Some(event) = rx.recv().await {
        if raw {
            if event.is_eof() {
                print!("{}", wire::DONE_FRAME);
                continue;
            }
            match wire::encode(&event) {
                Ok(frame) => print!("{frame}"),
                Err(err) => error!("failed to encode event: {err}"),
            }
            continue;
        }
        match event {
            StreamResponse::Delta(delta) => {
                if let Some(content) = delta.content {
                    print!("{}", content.bright_white());
                    std::io::stdout().flush().ok();
                }
            }
            StreamResponse::Metadata(metadata) => {
                let usage = format!("[{} tokens]", metadata.total_tokens);
                print!(" {}", usage.dimmed());
            }
            StreamResponse::Error { message } => {
                println!();
                print_error(&message);
            }
            StreamResponse::Eof => println!(),
        }
    }
}

fn spinner() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .map(|s| s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style);
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar
}

fn print_error(err: &dyn std::fmt::Display) {
    println!("{}❌ {}", BAR_CHAR.bright_red(), err.to_string().red());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[inline]
fn host_os() -> &'static str {
    match env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "some other OS",
    }
}
