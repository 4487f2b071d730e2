use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use taskboard_client::config::{default_config_path, load_config};
use taskboard_client::logging;
use taskboard_client::rest::RestGateway;
use taskboard_core::controller::{BoardController, MoveOutcome};
use taskboard_core::drag::{DropLocation, DropResult};
use taskboard_core::store::{EntityStore, LoadState};
use taskboard_core::types::{Board, BoardPatch, ListPatch, TaskPatch};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Manage boards, lists and tasks on a hosted task board")]
struct Args {
    /// Config file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List your boards, newest first.
    Boards,
    CreateBoard {
        title: String,
    },
    RenameBoard {
        board: String,
        title: String,
    },
    DeleteBoard {
        board: String,
    },
    /// Print a board with its lists and tasks in order.
    Show {
        board: String,
    },
    AddList {
        board: String,
        title: String,
    },
    RenameList {
        board: String,
        list: String,
        title: String,
    },
    DeleteList {
        board: String,
        list: String,
    },
    AddTask {
        board: String,
        list: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    EditTask {
        board: String,
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
    },
    /// Move a task to `index` within `to_list`, as a drag and drop would.
    MoveTask {
        board: String,
        task: String,
        to_list: String,
        index: usize,
    },
    DeleteTask {
        board: String,
        task: String,
    },
}

impl Command {
    fn board(&self) -> Option<&str> {
        match self {
            Command::Boards | Command::CreateBoard { .. } => None,
            Command::RenameBoard { board, .. }
            | Command::DeleteBoard { board }
            | Command::Show { board }
            | Command::AddList { board, .. }
            | Command::RenameList { board, .. }
            | Command::DeleteList { board, .. }
            | Command::AddTask { board, .. }
            | Command::EditTask { board, .. }
            | Command::MoveTask { board, .. }
            | Command::DeleteTask { board, .. } => Some(board),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)?;
    config.apply_env();
    config.validate(&config_path)?;
    if let Err(e) = logging::init(&config) {
        eprintln!("taskboard: logger already initialized: {}", e);
    }

    let gateway = RestGateway::new(&config).context("Failed to build HTTP client")?;
    let store = Arc::new(EntityStore::new());
    let controller = BoardController::new(Arc::new(gateway), store.clone());

    if let Some(board_id) = args.command.board() {
        match controller.load_board(board_id).await {
            LoadState::Ready => {}
            LoadState::NotFound => bail!("Board not found"),
            _ => bail!(
                "{}",
                store
                    .snapshot()
                    .error
                    .unwrap_or_else(|| format!("Failed to load board {}", board_id))
            ),
        }
    }

    run(&controller, args.command).await
}

async fn run(controller: &BoardController, command: Command) -> Result<()> {
    let store = controller.store();
    match command {
        Command::Boards => {
            controller.load_boards().await?;
            for board in store.snapshot().boards.iter() {
                print_board_line(board);
            }
        }
        Command::CreateBoard { title } => {
            let board = controller.create_board(&title).await?;
            print_board_line(&board);
        }
        Command::RenameBoard { board, title } => {
            controller
                .update_board(&board, &BoardPatch::title(title))
                .await?;
        }
        Command::DeleteBoard { board } => {
            controller.delete_board(&board).await?;
            println!("Deleted board {}", board);
        }
        Command::Show { board } => print_board(store, &board),
        Command::AddList { title, .. } => {
            let list = controller.create_list(&title).await?;
            println!("{}\t{}\t{}", list.id, list.position, list.title);
        }
        Command::RenameList { list, title, .. } => {
            controller.update_list(&list, &ListPatch::title(title)).await?;
        }
        Command::DeleteList { list, .. } => {
            controller.delete_list(&list).await?;
            println!("Deleted list {}", list);
        }
        Command::AddTask {
            list,
            title,
            description,
            ..
        } => {
            let task = controller.create_task(&list, &title, description).await?;
            println!("{}\t{}\t{}", task.id, task.position, task.title);
        }
        Command::EditTask {
            task,
            title,
            description,
            clear_description,
            ..
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                ..Default::default()
            };
            controller.update_task(&task, &patch).await?;
        }
        Command::MoveTask {
            board,
            task,
            to_list,
            index,
        } => {
            let snapshot = store.snapshot();
            let Some(current) = snapshot.tasks.iter().find(|t| t.id == task) else {
                bail!("Task not found: {}", task);
            };
            let source_index = snapshot
                .tasks_in_list(&current.list_id)
                .iter()
                .position(|t| t.id == task)
                .unwrap_or_default();
            let drop = DropResult {
                task_id: task.clone(),
                source: DropLocation::new(current.list_id.clone(), source_index),
                destination: Some(DropLocation::new(to_list, index)),
            };
            match controller.move_task(&drop).await? {
                MoveOutcome::Unchanged => println!("Task {} is already there", task),
                MoveOutcome::Moved => print_board(store, &board),
            }
        }
        Command::DeleteTask { task, .. } => {
            controller.delete_task(&task).await?;
            println!("Deleted task {}", task);
        }
    }
    Ok(())
}

fn print_board_line(board: &Board) {
    println!(
        "{}\t{}\t{}",
        board.id,
        board.created_at.format("%Y-%m-%d %H:%M"),
        board.title
    );
}

fn print_board(store: &EntityStore, board_id: &str) {
    let snapshot = store.snapshot();
    if let Some(board) = &snapshot.current_board {
        println!("# {}", board.title);
    }
    for list in snapshot.lists_for_board(board_id) {
        println!();
        println!("## {} ({})", list.title, list.id);
        for task in snapshot.tasks_in_list(&list.id) {
            match &task.description {
                Some(description) => println!(
                    "- [{}] {} ({})\n    {}",
                    task.position, task.title, task.id, description
                ),
                None => println!("- [{}] {} ({})", task.position, task.title, task.id),
            }
        }
    }
}
