//! Interactive terminal player.
//!
//! Drives an engine from stdin: each screen is the rendered main surface
//! with its anchors collapsed into numbered choices, and single-line
//! commands pick a choice or operate saves and history.

use std::io::{self, BufRead, Write};

use weft_core::ModuleTree;
use weft_engine::{
    BufferSurface, Engine, EngineConfig, EngineError, MemoryHistory, PlainRenderer, SaveStore,
    ScriptHost, TARGET_ATTR,
};

/// Script host for plain-markup stories. No author code runs; directives
/// are dropped with a warning. Snapshots exist (empty) so checkpoints,
/// saves, and undo still replay navigation.
struct ShellHost;

impl ScriptHost for ShellHost {
    fn eval(&mut self, expr: &str, _engine: &mut Engine) -> Result<String, EngineError> {
        tracing::warn!(expr, "no scripting backend; emit directive dropped");
        Ok(String::new())
    }

    fn exec(&mut self, stmt: &str, _engine: &mut Engine) -> Result<(), EngineError> {
        tracing::warn!(stmt, "no scripting backend; statement dropped");
        Ok(())
    }

    fn create_snapshot(&self) -> Option<serde_json::Value> {
        Some(serde_json::Value::Null)
    }
}

/// One rendered screen: anchor markup collapsed to numbered choice
/// labels, with the intercept targets collected in choice order.
struct Screen {
    text: String,
    targets: Vec<String>,
}

impl Screen {
    fn parse(html: &str) -> Screen {
        let mut text = String::new();
        let mut targets = Vec::new();
        let mut pos = 0usize;
        while let Some(open) = html[pos..].find("<a") {
            let open = pos + open;
            text.push_str(&html[pos..open]);
            let Some(tag_end) = html[open..].find('>') else {
                // Unclosed tag: emit the rest literally.
                pos = open;
                break;
            };
            let tag_end = open + tag_end + 1;
            let Some(close) = html[tag_end..].find("</a>") else {
                pos = open;
                break;
            };
            let close = tag_end + close;

            let label = &html[tag_end..close];
            match attr(&html[open..tag_end], TARGET_ATTR) {
                Some(target) => {
                    targets.push(target.to_owned());
                    text.push_str(label);
                    text.push_str(&format!(" [{}]", targets.len()));
                }
                None => text.push_str(label),
            }
            pos = close + "</a>".len();
        }
        text.push_str(&html[pos..]);
        Screen { text, targets }
    }
}

fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("{}=\"", name);
    let start = tag.find(&marker)? + marker.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// Run a compiled story interactively until quit or end of input.
pub fn play(tree: ModuleTree, start: &str, no_undo: bool, no_saves: bool) -> Result<(), String> {
    let surface = BufferSurface::new();
    let history = MemoryHistory::new();
    let mut engine = Engine::new(
        EngineConfig {
            start_passage: start.to_owned(),
            hide_links: false,
            allow_undo: !no_undo,
            allow_saves: !no_saves,
        },
        Box::new(PlainRenderer),
        Box::new(surface.clone()),
        Box::new(history.clone()),
    );
    let mut host = ShellHost;
    engine.init(tree, &mut host);
    engine.start(&mut host).map_err(|e| e.to_string())?;

    let mut saves = SaveStore::new();
    let mut popups_shown = 0usize;
    let stdin = io::stdin();
    let mut out = io::stdout();
    let mut line = String::new();

    loop {
        let screen = Screen::parse(&surface.main());
        writeln!(out, "\n{}", screen.text.trim_end()).map_err(|e| e.to_string())?;
        for popup in surface.popups().iter().skip(popups_shown) {
            writeln!(out, "  * {}", Screen::parse(popup).text.trim_end())
                .map_err(|e| e.to_string())?;
        }
        popups_shown = surface.popups().len();

        write!(out, "> ").and_then(|_| out.flush()).map_err(|e| e.to_string())?;
        line.clear();
        if stdin.lock().read_line(&mut line).map_err(|e| e.to_string())? == 0 {
            break;
        }

        let command = line.trim();
        let result = match command {
            "" => continue,
            "q" | "quit" => break,
            "undo" => match history.back() {
                Some(blob) => engine.restore_checkpoint(&blob, &mut host),
                None => {
                    writeln!(out, "nothing to undo").map_err(|e| e.to_string())?;
                    Ok(())
                }
            },
            "redo" => match history.forward() {
                Some(blob) => engine.restore_checkpoint(&blob, &mut host),
                None => {
                    writeln!(out, "nothing to redo").map_err(|e| e.to_string())?;
                    Ok(())
                }
            },
            "saves" => {
                for name in saves.names() {
                    writeln!(out, "  {}", name).map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            _ => {
                if let Some(name) = command.strip_prefix("save ") {
                    if no_saves {
                        writeln!(out, "saving is disabled").map_err(|e| e.to_string())?;
                        continue;
                    }
                    match engine.last_checkpoint() {
                        Some(blob) => {
                            saves.save(name.trim(), blob);
                            writeln!(out, "saved {}", name.trim()).map_err(|e| e.to_string())?;
                        }
                        None => {
                            writeln!(out, "nothing to save yet").map_err(|e| e.to_string())?;
                        }
                    }
                    Ok(())
                } else if let Some(name) = command.strip_prefix("load ") {
                    match saves.load(name.trim()).map(str::to_owned) {
                        Some(blob) => engine.restore_checkpoint(&blob, &mut host),
                        None => {
                            writeln!(out, "no save named {}", name.trim())
                                .map_err(|e| e.to_string())?;
                            Ok(())
                        }
                    }
                } else if let Ok(choice) = command.parse::<usize>() {
                    match choice
                        .checked_sub(1)
                        .and_then(|i| screen.targets.get(i))
                        .cloned()
                    {
                        Some(target) => engine.follow(&target, &mut host),
                        None => {
                            writeln!(out, "no choice {}", choice).map_err(|e| e.to_string())?;
                            Ok(())
                        }
                    }
                } else {
                    writeln!(out, "commands: <number>, undo, redo, save <name>, load <name>, saves, quit")
                        .map_err(|e| e.to_string())?;
                    Ok(())
                }
            }
        };

        // A failed turn is reported, not fatal; the engine unwinds cleanly.
        if let Err(e) = result {
            writeln!(out, "error: {}", e).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
