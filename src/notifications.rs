use std::sync::Arc;

use askama::Template;
use diesel::{QueryDsl, SelectableHelper};
use diesel_async::{pooled_connection::deadpool::Object, AsyncPgConnection, RunQueryDsl};
use lettre::{
    message::{header, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use uuid::Uuid;

use crate::{
    config::MailConfig,
    posts::models::Post,
    schema::users,
    users::models::{User, UserResponseBrief},
};

pub const NEW_POST_SUBJECT: &str = "New post on MiniRSN";

#[derive(thiserror::Error, Debug)]
pub enum NotificationError {
    #[error("invalid mailbox address")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email message")]
    Message(#[from] lettre::error::Error),

    #[error("failed to send email")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("failed to render email body")]
    Render(#[from] askama::Error),

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
}

/// Async SMTP wrapper. An empty host leaves it in no-op mode, which only
/// logs what it would have sent.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        let from = config.smtp_from.parse::<Mailbox>()?;

        let transport = if config.smtp_host.trim().is_empty() {
            tracing::warn!("SMTP host not configured, mailer runs in no-op mode");
            None
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                    .port(config.smtp_port);

            if let (Some(username), Some(password)) =
                (&config.smtp_username, &config.smtp_password)
            {
                builder =
                    builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    pub async fn send_html(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotificationError> {
        if let Some(transport) = &self.transport {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient.parse::<Mailbox>()?)
                .subject(subject)
                .header(header::ContentType::TEXT_HTML)
                .body(html_body.to_string())?;

            transport.send(email).await?;
            tracing::info!(subject, recipient, "email sent");
        } else {
            tracing::info!(subject, recipient, "mailer in no-op mode, skipping send");
        }

        Ok(())
    }
}

#[derive(Template)]
#[template(path = "emails/new_post_notification.html")]
struct NewPostEmailTemplate<'a> {
    post: &'a Post,
    author: &'a UserResponseBrief,
}

/// Tell everyone except the author about a freshly created post: one shared
/// body, one discrete message per recipient. Errors are returned to the
/// caller; by the time this runs the post is already committed, so the
/// creating controller decides to log rather than fail the request.
pub async fn notify_new_post(
    db: &mut Object<AsyncPgConnection>,
    mailer: &Mailer,
    post: &Post,
    author: &UserResponseBrief,
) -> Result<usize, NotificationError> {
    let all_users = users::table
        .select(User::as_select())
        .load::<User>(db)
        .await?;

    let recipients = eligible_recipients(&all_users, post.user_id);

    if recipients.is_empty() {
        return Ok(0);
    }

    let html_body = NewPostEmailTemplate { post, author }.render()?;

    for recipient in &recipients {
        mailer
            .send_html(recipient, NEW_POST_SUBJECT, &html_body)
            .await?;
    }

    Ok(recipients.len())
}

/// Everyone with a non-empty email, except the author.
fn eligible_recipients(all_users: &[User], author_id: Uuid) -> Vec<String> {
    all_users
        .iter()
        .filter(|user| user.id != author_id && !user.email.is_empty())
        .map(|user| user.email.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::users::models::UserRole;

    use super::*;

    fn user(email: &str) -> User {
        User {
            id: Uuid::now_v7(),
            username: "someone".to_string(),
            email: email.to_string(),
            password: "$argon2id$...".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn everyone_but_the_author_gets_a_mail() {
        let author = user("author@example.com");
        let others = [user("a@example.com"), user("b@example.com")];
        let all = vec![author.clone(), others[0].clone(), others[1].clone()];

        let recipients = eligible_recipients(&all, author.id);

        assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn a_lonely_author_sends_nothing() {
        let author = user("author@example.com");
        let all = vec![author.clone()];

        assert!(eligible_recipients(&all, author.id).is_empty());
    }

    #[test]
    fn blank_addresses_are_skipped() {
        let author = user("author@example.com");
        let all = vec![author.clone(), user(""), user("c@example.com")];

        assert_eq!(eligible_recipients(&all, author.id), vec!["c@example.com"]);
    }
}
