use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use parley_db::{Database, DbConfig};
use parley_types::{EditMessage, NewMessage, Role};

const USAGE: &str = "\
usage: parley-admin <command> [args]

commands:
  migrate
  add-user <username> [guest|host|admin]
  new-conversation <user-id>...
  send <conversation-id> <sender-id> <receiver-id|-> <body> [parent-id]
  edit <message-id> <body> [editor-id]
  delete-user <user-id>
  unread <user-id>
  history <message-id>
  thread <message-id>

environment:
  PARLEY_DB_PATH            database file (default parley.db)
  PARLEY_RECEIVER_DELETION  delete-message | null-receiver";

#[derive(Debug, PartialEq)]
enum Command {
    Migrate,
    AddUser { username: String, role: Role },
    NewConversation { participants: Vec<Uuid> },
    Send(NewMessage),
    Edit(EditMessage),
    DeleteUser(Uuid),
    Unread(Uuid),
    History(Uuid),
    Thread(Uuid),
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_db=info,parley_admin=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = DbConfig::from_env()?;
    let db = Database::open(&config)
        .with_context(|| format!("opening {}", config.path.display()))?;
    info!("Receiver deletion policy: {:?}", config.receiver_deletion);

    run(&db, command)
}

fn run(db: &Database, command: Command) -> Result<()> {
    match command {
        Command::Migrate => {
            print_json(&serde_json::json!({
                "schema_version": db.schema_version()?
            }))
        }
        Command::AddUser { username, role } => print_json(&db.create_user(&username, role)?),
        Command::NewConversation { participants } => {
            print_json(&db.create_conversation(&participants)?)
        }
        Command::Send(req) => {
            let (message, notification) = db.create_message(req)?;
            print_json(&serde_json::json!({
                "message": message,
                "notification": notification,
            }))
        }
        Command::Edit(req) => {
            let message_id = req.message_id;
            let entry = db.edit_message(req)?;
            print_json(&serde_json::json!({
                "history_entry": entry,
                "message": db.get_message(message_id)?,
            }))
        }
        Command::DeleteUser(id) => print_json(&db.delete_user(id)?),
        Command::Unread(id) => print_json(&db.unread_for(id)?),
        Command::History(id) => print_json(&db.message_history(id)?),
        Command::Thread(id) => {
            let thread = db
                .thread(id)?
                .ok_or_else(|| anyhow!("message not found: {id}"))?;
            print_json(&thread)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command> {
    let (name, rest) = args.split_first().ok_or_else(|| anyhow!("missing command"))?;
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("migrate", []) => Command::Migrate,
        ("add-user", [username]) => Command::AddUser {
            username: username.to_string(),
            role: Role::Guest,
        },
        ("add-user", [username, role]) => Command::AddUser {
            username: username.to_string(),
            role: role.parse()?,
        },
        ("new-conversation", ids) => Command::NewConversation {
            participants: ids.iter().map(|id| parse_id(id)).collect::<Result<_>>()?,
        },
        ("send", [conversation, sender, receiver, body, parent @ ..]) if parent.len() <= 1 => {
            Command::Send(NewMessage {
                conversation_id: parse_id(conversation)?,
                sender_id: parse_id(sender)?,
                receiver_id: match *receiver {
                    "-" => None,
                    id => Some(parse_id(id)?),
                },
                body: body.to_string(),
                parent_id: parent.first().map(|id| parse_id(id)).transpose()?,
            })
        }
        ("edit", [message, body, editor @ ..]) if editor.len() <= 1 => Command::Edit(EditMessage {
            message_id: parse_id(message)?,
            body: body.to_string(),
            editor_id: editor.first().map(|id| parse_id(id)).transpose()?,
        }),
        ("delete-user", [id]) => Command::DeleteUser(parse_id(id)?),
        ("unread", [id]) => Command::Unread(parse_id(id)?),
        ("history", [id]) => Command::History(parse_id(id)?),
        ("thread", [id]) => Command::Thread(parse_id(id)?),
        (other, _) => bail!("unknown command or wrong arguments: {other}"),
    };

    Ok(command)
}

fn parse_id(value: &str) -> Result<Uuid> {
    value
        .parse()
        .with_context(|| format!("invalid id '{value}'"))
}
