use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::Context;
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::broadcast::error::RecvError;
use filebeam_client::notify::NotificationMessage;
use filebeam_client::upload::UploadError;
use filebeam_client::utils::{format_bytes, format_percentage, progress_bar};
use filebeam_client::{
    BeamClient,
    FileListing,
    FilePayload,
    NotificationEvent,
    Outcome,
    Severity,
    UploadEvent,
    UploadProgress,
    UploadState,
};

const BAR_WIDTH: usize = 30;

pub async fn list(client: &BeamClient) -> ExitCode {
    match client.listing.load().await {
        Ok(listing) => {
            print_listing(client, &listing);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to load file list: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn print_listing(client: &BeamClient, listing: &FileListing) {
    if listing.is_empty() {
        println!("No shared files");
        return;
    }

    for entry in &listing.files {
        let link = client
            .listing
            .resolve(&entry.download_url)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| entry.download_url.clone());
        println!("{:<40} {:>10}  {}  {}", entry.name, entry.size_human, entry.modified_str, link);
    }

    let count = listing.count.unwrap_or(listing.files.len());
    match &listing.total_size_human {
        Some(total) => println!("{} files, {}", count, total),
        None => println!("{} files", count),
    }
}

/// Drives one upload until its progress display would be hidden.
pub async fn upload(client: &BeamClient, file: Option<PathBuf>, password: String) -> anyhow::Result<ExitCode> {
    let payload = match file {
        Some(path) => Some(
            FilePayload::from_path(&path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?,
        ),
        None => None,
    };

    let mut events = client.uploads().subscribe_events();
    let mut notices = client.notifications.subscribe();
    let session_id = client.uploads().submit(payload, password).await?;

    let mut stdout = io::stdout();
    let mut outcome: Option<Outcome> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !client.uploads().cancel().await? {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) if event.session_id() != session_id => {}
                Ok(UploadEvent::StateChanged { new_state: UploadState::Submitting, .. }) => {
                    draw_line(&mut stdout, "Uploading file...".to_string())?;
                }
                Ok(UploadEvent::Progress { progress, .. }) => {
                    draw_line(&mut stdout, progress_line(progress))?;
                }
                Ok(UploadEvent::Finished { outcome: finished, .. }) => {
                    clear_line(&mut stdout)?;
                    let rejected = matches!(finished, Outcome::Failed(UploadError::Validation(_)));
                    outcome = Some(finished);
                    // Nothing to hide later, the upload never started
                    if rejected {
                        break;
                    }
                }
                Ok(UploadEvent::ListingRefreshDue { .. }) => {
                    list(client).await;
                }
                Ok(UploadEvent::ProgressHidden { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            notice = notices.recv() => {
                if let Ok(NotificationEvent::Posted(message)) = notice {
                    print_notice(&mut stdout, &message)?;
                }
            }
        }
    }

    while let Ok(notice) = notices.try_recv() {
        if let NotificationEvent::Posted(message) = notice {
            print_notice(&mut stdout, &message)?;
        }
    }

    let succeeded = outcome.is_some_and(|outcome| outcome.is_success());
    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn progress_line(progress: UploadProgress) -> String {
    match (progress.percentage(), progress.bytes_total) {
        (Some(percentage), Some(total)) => format!(
            "{} {} ({} / {})",
            progress_bar(percentage, BAR_WIDTH),
            format_percentage(percentage),
            format_bytes(progress.bytes_sent),
            format_bytes(total),
        ),
        _ => format!("{} sent", format_bytes(progress.bytes_sent)),
    }
}

fn draw_line(stdout: &mut Stdout, line: String) -> io::Result<()> {
    execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line))?;
    stdout.flush()
}

fn clear_line(stdout: &mut Stdout) -> io::Result<()> {
    execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))
}

fn print_notice(stdout: &mut Stdout, message: &NotificationMessage) -> io::Result<()> {
    let text = message.text.clone();
    let styled = match message.severity {
        Severity::Success => text.green(),
        Severity::Error => text.red(),
        Severity::Warning => text.yellow(),
        Severity::Info => text.blue(),
    };

    clear_line(stdout)?;
    execute!(stdout, Print(styled), Print("\n"))
}
