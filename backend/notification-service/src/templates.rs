/// Subjects and bodies of the notification mails
use crate::mailer::Email;
use event_schema::{NewCommentEvent, NewPostEvent, NewReactionEvent, RegistrationCodeEvent};

/// Subject and body shared by every recipient of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

impl Template {
    pub fn to(&self, address: &str) -> Email {
        Email {
            to: address.to_string(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

pub fn new_post(event: &NewPostEvent) -> Template {
    Template {
        subject: format!("New post in spector {}", event.spector_name),
        body: format!("Check out the new post: {}", event.post_link),
    }
}

pub fn new_comment(event: &NewCommentEvent) -> Template {
    Template {
        subject: format!(
            "New comment on your message in spector {}",
            event.spector_name
        ),
        body: format!(
            "Your message {}\nreceived a new comment: {}",
            event.message_link, event.comment_link
        ),
    }
}

pub fn new_reaction(event: &NewReactionEvent, reactor_name: &str) -> Template {
    Template {
        subject: "New reaction to your message".to_string(),
        body: format!(
            "{} reacted {} to your message {}",
            reactor_name, event.reaction_type, event.message_link
        ),
    }
}

pub fn registration_code(event: &RegistrationCodeEvent) -> Template {
    Template {
        subject: "Your Spectra registration code".to_string(),
        body: format!("Your registration code: {}", event.code),
    }
}
