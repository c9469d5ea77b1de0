#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for exercising the ActiveSync engine against a live server

use airsync_client::{
    AccountConfig, EasClient, MailItem, MeetingUserResponse, MemoryAccounts, MemoryMirror,
    SyncItem,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "airsync-cli")]
#[command(about = "Synchronize mail, calendar, contacts, and tasks over ActiveSync")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronize the folder hierarchy and print it
    Folders,

    /// Synchronize one folder's items and list them
    Sync {
        /// Server id of the folder to synchronize
        folder: String,

        /// Maximum number of items to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Synchronize all calendar folders
    Calendar,

    /// Fetch and print the full body of an item
    Body {
        /// Server id of the item
        item: String,

        /// Folder containing the item
        #[arg(long)]
        folder: String,
    },

    /// Download an attachment by file reference
    Attachment {
        /// Opaque server file reference
        reference: String,

        /// Write the bytes to this file
        #[arg(long)]
        out: std::path::PathBuf,
    },

    /// Send a read receipt for an item
    Receipt {
        /// Server id of the item
        item: String,

        /// Folder containing the item
        #[arg(long)]
        folder: String,
    },

    /// Answer a meeting invitation
    Meeting {
        /// Server id of the invitation item
        request: String,

        /// Folder containing the invitation
        #[arg(long)]
        folder: String,

        /// accept | tentative | decline
        #[arg(long, default_value = "accept")]
        response: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AccountConfig::from_env()?;
    let account_id = config.account_id.clone();

    let accounts = Arc::new(MemoryAccounts::new());
    accounts.insert(config);
    let mirror = Arc::new(MemoryMirror::new());
    let client = EasClient::new(accounts, mirror.clone());

    match &args.command {
        Command::Folders => cmd_folders(&client, &mirror, &args, &account_id).await?,
        Command::Sync { folder, limit } => {
            cmd_sync(&client, &mirror, &args, &account_id, folder, *limit).await?;
        }
        Command::Calendar => {
            let changed = client.sync_calendar(&account_id).await?;
            println!("{changed} calendar change(s) applied");
        }
        Command::Body { item, folder } => {
            cmd_body(&client, &mirror, &account_id, folder, item).await?;
        }
        Command::Attachment { reference, out } => {
            let bytes = client.download_attachment(&account_id, reference).await?;
            std::fs::write(out, &bytes)?;
            println!("{} byte(s) written to {}", bytes.len(), out.display());
        }
        Command::Receipt { item, folder } => {
            // The item must be mirrored before a receipt can reference it.
            client.sync_folder_items(&account_id, folder).await?;
            client.send_read_receipt(&account_id, item).await?;
            println!("read receipt sent for {item}");
        }
        Command::Meeting {
            request,
            folder,
            response,
        } => {
            let response = parse_meeting_response(response)?;
            let calendar_id = client
                .respond_to_meeting(&account_id, folder, request, response)
                .await?;
            match calendar_id {
                Some(id) => println!("meeting answered, calendar item {id}"),
                None => println!("meeting answered"),
            }
        }
    }

    Ok(())
}

fn parse_meeting_response(s: &str) -> anyhow::Result<MeetingUserResponse> {
    match s {
        "accept" => Ok(MeetingUserResponse::Accepted),
        "tentative" => Ok(MeetingUserResponse::Tentative),
        "decline" => Ok(MeetingUserResponse::Declined),
        other => anyhow::bail!("unknown meeting response '{other}'"),
    }
}

async fn cmd_folders(
    client: &EasClient,
    mirror: &MemoryMirror,
    args: &Args,
    account_id: &str,
) -> anyhow::Result<()> {
    use airsync_client::MirrorStore;

    let changed = client.sync_folders(account_id).await?;
    let folders = mirror.folders(account_id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        for folder in &folders {
            println!(
                "{:<12} {:<24} {:?}",
                folder.server_id, folder.display_name, folder.kind
            );
        }
        println!("\n{changed} folder change(s) applied");
    }

    Ok(())
}

async fn cmd_sync(
    client: &EasClient,
    mirror: &MemoryMirror,
    args: &Args,
    account_id: &str,
    folder: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let changed = client.sync_folder_items(account_id, folder).await?;
    let items = mirror.items_in_folder(account_id, folder);
    let display: Vec<&SyncItem> = items.iter().take(limit).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&display)?);
    } else {
        print_item_table(&display);
        println!("\n{changed} change(s) applied");
    }

    Ok(())
}

async fn cmd_body(
    client: &EasClient,
    mirror: &MemoryMirror,
    account_id: &str,
    folder: &str,
    item_id: &str,
) -> anyhow::Result<()> {
    use airsync_client::MirrorStore;

    client.sync_folder_items(account_id, folder).await?;
    client.load_item_body(account_id, item_id).await?;

    let Some(SyncItem::Mail(mail)) = mirror.item(account_id, item_id)? else {
        anyhow::bail!("item {item_id} is not a mail item");
    };
    print_mail_detail(&mail);
    Ok(())
}

fn print_item_table(items: &[&SyncItem]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    let header = format!("{:<12} {:<20} {:<30} {}", "ID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for item in items {
        match item {
            SyncItem::Mail(mail) => println!(
                "{:<12} {:<20} {:<30} {}",
                mail.server_id,
                mail.date
                    .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string()),
                truncate(&mail.from, 28),
                truncate(&mail.subject, 40),
            ),
            SyncItem::Event(event) => println!(
                "{:<12} {:<20} {:<30} {}",
                event.server_id,
                event
                    .start
                    .map_or_else(|| "-".to_string(), |epoch| epoch.to_string()),
                truncate(&event.organizer, 28),
                truncate(&event.subject, 40),
            ),
            SyncItem::Contact(contact) => println!(
                "{:<12} {:<20} {:<30} {}",
                contact.server_id,
                "-",
                truncate(contact.email.as_deref().unwrap_or("-"), 28),
                truncate(&contact.display_name, 40),
            ),
            SyncItem::Task(task) => println!(
                "{:<12} {:<20} {:<30} {}",
                task.server_id,
                task.due
                    .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
                if task.complete { "done" } else { "open" },
                truncate(&task.subject, 40),
            ),
        }
    }

    println!("\n{} item(s)", items.len());
}

fn print_mail_detail(mail: &MailItem) {
    println!("ID:      {}", mail.server_id);
    println!("From:    {}", mail.from);
    println!("To:      {}", mail.to.join(", "));
    if !mail.cc.is_empty() {
        println!("CC:      {}", mail.cc.join(", "));
    }
    println!("Subject: {}", mail.subject);

    if !mail.attachments.is_empty() {
        println!("\n--- Attachments ---");
        for att in &mail.attachments {
            println!(
                "  {} ({}, {} bytes, ref {})",
                att.display_name, att.content_type, att.estimated_size, att.file_reference
            );
        }
    }

    println!("\n--- Body ---\n");
    match &mail.body {
        Some(body) => println!("{}", body.text),
        None => println!("(body not fetched)"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
