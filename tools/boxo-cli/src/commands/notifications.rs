//! Notification inbox commands.

use anyhow::Result;
use boxo_commerce::prelude::*;

use super::{NotificationsArgs, NotificationsCommand};
use crate::context::Context;
use crate::output::{format_time, short_id};

/// Run the notifications command.
pub async fn run(args: NotificationsArgs, ctx: &Context) -> Result<()> {
    let user = UserId::new(args.user);
    match args
        .command
        .unwrap_or(NotificationsCommand::List { unread: false })
    {
        NotificationsCommand::List { unread } => list(&user, unread, ctx).await,
        NotificationsCommand::Read { notification } => {
            read(&user, &NotificationId::new(notification), ctx).await
        }
    }
}

async fn list(user: &UserId, unread_only: bool, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let notifications: Vec<Notification> = session
        .orchestrator
        .notifications_for(user)
        .await?
        .into_iter()
        .filter(|n| !unread_only || !n.is_read)
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&notifications);
        return Ok(());
    }

    ctx.output.header(&format!("Notifications for {}", user));
    if notifications.is_empty() {
        ctx.output.info("No notifications.");
        return Ok(());
    }

    for n in &notifications {
        let marker = if n.is_read { " " } else { "●" };
        println!(
            "{} {}  {}  {}",
            marker,
            short_id(n.id.as_str()),
            format_time(n.created_at),
            n.title
        );
        println!("    {}", n.content);
    }
    Ok(())
}

async fn read(user: &UserId, id: &NotificationId, ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let notification = session.orchestrator.mark_notification_read(user, id).await?;
    ctx.commit(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&notification);
    } else {
        ctx.output.success(&format!("Marked as read: {}", notification.title));
    }
    Ok(())
}
