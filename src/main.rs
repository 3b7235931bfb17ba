use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use dialoguer::{Input, Select};

use flowpad::document;
use flowpad::editor::{EditSession, SaveOutcome};
use flowpad::graph::{ConnectionParams, Graph};
use flowpad::FlowError;

#[derive(Debug, Parser)]
#[command(
    name = "flowpad",
    about = "Build and persist node-and-edge flow diagrams from the terminal or the browser."
)]
struct Cli {
    /// Path to the flow document. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to write the normalized document to. Use '-' for stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Apply the automatic vertical layout before writing.
    #[arg(long = "arrange", action = ArgAction::SetTrue)]
    arrange: bool,

    /// Open the interactive terminal editor on the input document.
    #[arg(
        long = "edit",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["output", "serve"],
        requires = "input"
    )]
    edit: bool,

    /// Create a new flow document with the seed graph and open the editor.
    #[arg(
        short = 'n',
        long = "new",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["input", "output", "edit"]
    )]
    new: bool,

    /// Launch the web editor instead of the terminal one.
    #[arg(long = "serve", action = ArgAction::SetTrue, conflicts_with = "output")]
    serve: bool,

    /// Override the host binding when using --serve.
    #[arg(long = "serve-host", requires = "serve")]
    serve_host: Option<String>,

    /// Override the port binding when using --serve.
    #[arg(long = "serve-port", requires = "serve")]
    serve_port: Option<u16>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.new {
        let path = ensure_unique_path(PathBuf::from(document::EXPORT_FILE_NAME));
        let graph = Graph::new();
        fs::write(&path, graph.export()?)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        if !cli.quiet {
            println!("created {}", path.display());
        }
        if cli.serve {
            return run_server(&cli, path);
        }
        return run_editor(&path, cli.quiet);
    }

    if cli.serve {
        let path = PathBuf::from(
            cli.input
                .clone()
                .unwrap_or_else(|| document::EXPORT_FILE_NAME.to_string()),
        );
        if path.to_str() == Some("-") {
            bail!("--serve needs a file path, not stdin");
        }
        return run_server(&cli, path);
    }

    if cli.edit {
        let input = cli.input.as_deref().unwrap_or_default();
        if input == "-" {
            bail!("--edit needs a file path, not stdin");
        }
        return run_editor(Path::new(input), cli.quiet);
    }

    let Some(input) = cli.input.as_deref() else {
        bail!("nothing to do: provide --input, --new, --edit or --serve");
    };

    let source = match parse_input_source(input) {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read diagram from stdin")?;
            buffer
        }
        InputSource::File(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read '{}'", path.display()))?,
    };

    let mut graph =
        document::from_document(&source).with_context(|| format!("failed to parse '{input}'"))?;
    if cli.arrange {
        graph.auto_arrange();
    }
    let rendered = graph.export()?;

    match parse_output_destination(cli.output.as_deref()) {
        OutputDestination::Stdout => {
            io::stdout()
                .write_all(rendered.as_bytes())
                .context("failed to write document to stdout")?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, rendered.as_bytes())
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !cli.quiet {
                println!("wrote {}", path.display());
            }
        }
    }

    Ok(())
}

fn parse_input_source(raw: &str) -> InputSource {
    if raw == "-" {
        InputSource::Stdin
    } else {
        InputSource::File(PathBuf::from(raw))
    }
}

fn parse_output_destination(raw: Option<&str>) -> OutputDestination {
    match raw {
        None | Some("-") => OutputDestination::Stdout,
        Some(path) => OutputDestination::File(PathBuf::from(path)),
    }
}

fn ensure_unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flow".to_string());
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(String::from);

    let mut counter = 1;
    loop {
        let mut candidate = path.clone();
        let name = match &extension {
            Some(ext) => format!("{stem}{counter}.{ext}"),
            None => format!("{stem}{counter}"),
        };
        candidate.set_file_name(&name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(feature = "server")]
fn run_server(cli: &Cli, input: PathBuf) -> Result<()> {
    let args = flowpad::serve::ServeArgs {
        input,
        host: cli
            .serve_host
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: cli.serve_port.unwrap_or(5151),
    };
    let ui_root = std::env::var_os("FLOWPAD_WEB_DIST").map(PathBuf::from);

    tokio::runtime::Runtime::new()
        .context("failed to start async runtime")?
        .block_on(flowpad::serve::run_serve(args, ui_root))
}

#[cfg(not(feature = "server"))]
fn run_server(_cli: &Cli, _input: PathBuf) -> Result<()> {
    bail!("this build of flowpad does not include the web editor; rebuild with the 'server' feature")
}

fn run_editor(path: &Path, quiet: bool) -> Result<()> {
    let mut graph = if path.is_file() {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        document::from_document(&source)
            .with_context(|| format!("failed to parse '{}'", path.display()))?
    } else {
        Graph::new()
    };
    let mut session = EditSession::new();

    loop {
        let actions = [
            "Add node",
            "Edit node",
            "Connect nodes",
            "Auto-arrange",
            "Save and quit",
            "Quit without saving",
        ];
        let prompt = format!(
            "flowpad ({} nodes, {} edges)",
            graph.nodes().len(),
            graph.edges().len()
        );
        let choice = Select::new()
            .with_prompt(prompt)
            .items(&actions)
            .default(0)
            .interact()
            .context("editor menu was cancelled")?;

        match choice {
            0 => {
                session.open_new();
                prompt_and_save(&mut session, &mut graph, quiet)?;
            }
            1 => {
                let Some(id) = select_node(&graph, "Edit which node?")? else {
                    continue;
                };
                session.open_existing(&graph, &id)?;
                edit_node(&mut session, &mut graph, quiet)?;
            }
            2 => {
                if graph.nodes().len() < 2 {
                    println!("Need at least two nodes to connect.");
                    continue;
                }
                let Some(source) = select_node(&graph, "Connect from")? else {
                    continue;
                };
                let Some(target) = select_node(&graph, "Connect to")? else {
                    continue;
                };
                graph.connect(&source, &target, ConnectionParams::default());
            }
            3 => graph.auto_arrange(),
            4 => {
                fs::write(path, graph.export()?)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                if !quiet {
                    println!("wrote {}", path.display());
                }
                return Ok(());
            }
            _ => return Ok(()),
        }
    }
}

/// Lets the user pick a node by label; the last entry backs out.
fn select_node(graph: &Graph, prompt: &str) -> Result<Option<String>> {
    let mut items: Vec<String> = graph
        .nodes()
        .iter()
        .map(|node| format!("{} ({})", node.data.label, node.id))
        .collect();
    items.push("(back)".to_string());

    let selection = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()
        .context("node selection was cancelled")?;

    Ok(graph.nodes().get(selection).map(|node| node.id.clone()))
}

fn prompt_buffer(session: &mut EditSession) -> Result<()> {
    let Some(buffer) = session.buffer_mut() else {
        bail!("no edit form is open");
    };

    buffer.label = Input::<String>::new()
        .with_prompt("Label")
        .with_initial_text(buffer.label.clone())
        .allow_empty(true)
        .interact_text()?;
    buffer.description = Input::<String>::new()
        .with_prompt("Description")
        .with_initial_text(buffer.description.clone())
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

/// Prompts for the buffer fields and saves, re-prompting while the
/// label fails validation so the form stays open like a modal would.
fn prompt_and_save(session: &mut EditSession, graph: &mut Graph, quiet: bool) -> Result<()> {
    loop {
        prompt_buffer(session)?;
        match session.save(graph) {
            Ok(outcome) => {
                report_outcome(&outcome, quiet);
                return Ok(());
            }
            Err(FlowError::EmptyLabel) => {
                eprintln!("{}", FlowError::EmptyLabel);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn edit_node(session: &mut EditSession, graph: &mut Graph, quiet: bool) -> Result<()> {
    let actions = ["Save", "Delete node", "Cancel"];
    let choice = Select::new()
        .with_prompt("Node action")
        .items(&actions)
        .default(0)
        .interact()
        .context("node action selection was cancelled")?;

    match choice {
        0 => prompt_and_save(session, graph, quiet),
        1 => {
            let id = session.delete(graph)?;
            if !quiet {
                println!("deleted node {id}");
            }
            Ok(())
        }
        _ => {
            session.cancel();
            Ok(())
        }
    }
}

fn report_outcome(outcome: &SaveOutcome, quiet: bool) {
    if quiet {
        return;
    }
    match outcome {
        SaveOutcome::Added(id) => println!("added node {id}"),
        SaveOutcome::Updated(id) => println!("updated node {id}"),
        SaveOutcome::Skipped(id) => println!("node {id} no longer exists, nothing saved"),
    }
}
