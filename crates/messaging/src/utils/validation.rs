//! Content validation helpers.

use courier_database::NewMessage;

use crate::types::{MessagingError, MessagingResult};

const MAX_BODY_LENGTH: usize = 10_000;
const MAX_ATTACHMENT_REF_LENGTH: usize = 512;

/// Validate message content before it hits the store.
pub fn validate_content(content: &NewMessage) -> MessagingResult<()> {
    if content.body.trim().is_empty() && content.attachment_ref.is_none() {
        return Err(MessagingError::validation(
            "message needs a body or an attachment reference",
        ));
    }

    if content.body.len() > MAX_BODY_LENGTH {
        return Err(MessagingError::validation(format!(
            "message body too long (max {MAX_BODY_LENGTH} characters)"
        )));
    }

    if let Some(ref attachment_ref) = content.attachment_ref {
        if attachment_ref.trim().is_empty() {
            return Err(MessagingError::validation(
                "attachment reference cannot be blank",
            ));
        }
        if attachment_ref.len() > MAX_ATTACHMENT_REF_LENGTH {
            return Err(MessagingError::validation(
                "attachment reference too long",
            ));
        }
    }

    Ok(())
}
