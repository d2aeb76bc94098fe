//! Commit events from the post-commit hook.

use std::io::Write;

use anyhow::Result;

use dt_core::{CommitHash, CommitPayload, CommitStats, Event, EventKind, SessionId};
use dt_db::Database;

use super::ingest::submit;
use super::util::event_time;
use crate::cli::CommitArgs;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, args: &CommitArgs) -> Result<()> {
    let payload = CommitPayload {
        hash: CommitHash::new(args.hash.trim())?,
        message: args.message.clone(),
        author: args.author.clone(),
        branch: args.branch.clone(),
        stats: CommitStats {
            insertions: args.insertions,
            deletions: args.deletions,
            files_changed: args.files_changed,
        },
    };
    let event = Event::new(
        EventKind::Commit(payload),
        args.session.as_deref().map(SessionId::new).transpose()?,
        Some(args.repo.clone()),
        event_time(args.at.as_deref())?,
    );
    event.validate()?;
    submit(writer, db, &event)?;
    Ok(())
}
