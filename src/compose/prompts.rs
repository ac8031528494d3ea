//! Prompt templates for each module kind.
//!
//! The digest template switches shape on schedule density: light days
//! get a per-event walkthrough, heavy days get a narrative summary
//! that deliberately does not enumerate every meeting.

use crate::domain::{CalendarAggregate, Density, Document, DocumentAggregate, User};

pub const SCRIPT_WRITER_SYSTEM: &str = "You are an expert podcast host and script writer. \
    Create engaging, conversational briefing content that sounds natural when spoken aloud. \
    Use contractions, smooth transitions, and address the listener directly. \
    Respond with the script text only.";

pub const WELCOME_SYSTEM: &str = "You are a professional podcast script writer who creates \
    warm, engaging, conversational content. Respond with the script text only.";

pub fn welcome_prompt(user: &User) -> (String, String) {
    let prompt = format!(
        "Create a warm, friendly welcome script for a new listener of Briefcast, a \
         personalized podcast service.\n\
         \n\
         Listener name: {name}\n\
         \n\
         The script should:\n\
         - Be about 30-60 seconds when spoken\n\
         - Welcome them to Briefcast\n\
         - Explain briefly what Briefcast does (creates daily personalized podcasts from \
         their calendar and documents)\n\
         - Set expectations for their first real episode, generated tomorrow morning\n\
         - Sound natural and conversational, like a friendly host\n\
         \n\
         Write this as a script that will be converted to speech, so use natural speech \
         patterns.",
        name = user.display_name(),
    );
    (WELCOME_SYSTEM.to_string(), prompt)
}

pub fn calendar_digest_prompt(calendar: &CalendarAggregate) -> (String, String) {
    let date_str = calendar.date.format("%A, %B %-d, %Y");
    let metrics = &calendar.metrics;

    let mut prompt = format!(
        "Create the schedule segment of a personalized daily podcast for {date_str}.\n\
         \n\
         SCHEDULE OVERVIEW:\n\
         - Total events: {count}\n\
         - Busy time: {busy} minutes\n\
         - Back-to-back meetings: {b2b}\n",
        count = metrics.event_count,
        busy = metrics.busy_minutes,
        b2b = metrics.back_to_back,
    );

    if metrics.locations.len() > 1 {
        prompt.push_str(&format!(
            "- Travel day: locations include {}\n",
            metrics.locations.join(", ")
        ));
    }

    for error in &calendar.errors {
        prompt.push_str(&format!(
            "- Note: calendar '{}' could not be read today\n",
            error.calendar_name
        ));
    }

    match metrics.density {
        Density::Heavy => {
            prompt.push_str(&format!(
                "\nThis is a packed day. Do NOT list every meeting. Instead, describe the \
                 shape of the day as a narrative: when it starts, where the long stretches \
                 are, where the breaks fall{travel}, and what the listener should brace \
                 for. The longest single block is {longest} minutes.\n",
                travel = if metrics.notable {
                    ", and the travel between locations"
                } else {
                    ""
                },
                longest = metrics.longest_event_minutes,
            ));
        }
        Density::Light | Density::Moderate => {
            prompt.push_str("\nSCHEDULE DETAIL:\n");
            for event in &calendar.events {
                let time = if event.is_all_day {
                    "All day".to_string()
                } else {
                    format!(
                        "{} - {}",
                        event
                            .start
                            .with_timezone(&calendar.timezone)
                            .format("%-I:%M %p"),
                        event
                            .end
                            .with_timezone(&calendar.timezone)
                            .format("%-I:%M %p"),
                    )
                };
                prompt.push_str(&format!("- {}: {}", time, event.title));
                if let Some(location) = &event.location {
                    prompt.push_str(&format!(" (at {location})"));
                }
                if event.attendee_count > 0 {
                    prompt.push_str(&format!(" [{} attendees]", event.attendee_count));
                }
                prompt.push('\n');
            }
            prompt.push_str(
                "\nWalk through each meeting with its time, title, and anything notable \
                 about the location or attendees. Keep it brisk and friendly.\n",
            );
        }
    }

    prompt.push_str("\nOpen with a warm greeting and the date; end on an encouraging note.");
    (SCRIPT_WRITER_SYSTEM.to_string(), prompt)
}

pub fn document_overview_prompt(documents: &DocumentAggregate) -> (String, String) {
    let mut prompt = String::from(
        "Create the documents segment of a personalized daily podcast: a single collective \
         overview of the documents that changed or were shared recently.\n\nDOCUMENTS (in \
         priority order):\n",
    );

    for doc in &documents.documents {
        prompt.push_str(&format!("- {}", doc.name));
        if let Some(link) = &doc.linked_event {
            prompt.push_str(&format!(" (attached to meeting: {})", link.event_title));
        } else if doc.shared {
            prompt.push_str(" (shared with you)");
        }
        if !doc.extractable {
            prompt.push_str(" [summary unavailable]");
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "\nSummarize the set collectively in 1-2 minutes of speech: what arrived, what is \
         tied to today's meetings, and what deserves attention first. Mention documents \
         marked [summary unavailable] by name only, noting their contents could not be \
         read. Do not invent content.",
    );
    (SCRIPT_WRITER_SYSTEM.to_string(), prompt)
}

pub fn deepdive_prompt(document: &Document) -> (String, String) {
    let system = "You are a podcast host who specializes in breaking down documents into \
         digestible, engaging spoken content. Respond with the script text only.";

    let mut prompt = format!(
        "Create a detailed 2-3 minute podcast segment about this document:\n\
         \n\
         Document: {}\n",
        document.name
    );
    if let Some(link) = &document.linked_event {
        prompt.push_str(&format!(
            "Context: attached to today's meeting '{}'\n",
            link.event_title
        ));
    }
    if let Some(content) = &document.content {
        prompt.push_str(&format!(
            "Word count: {}\nContent preview:\n{}\n",
            content.word_count, content.preview
        ));
    }
    prompt.push_str(
        "\nThe segment should introduce the document and its context, summarize the key \
         points, explain why it matters, and close with actionable takeaways. Make it \
         sound like a knowledgeable friend explaining the document.",
    );
    (system.to_string(), prompt)
}
