/// Destination for transcript output.
///
/// The core only decides *what* is confirmed versus pending; where the text
/// goes (terminal, typing, clipboard) is a collaborator behind this trait.
use crate::coordinator::TranscriptEvent;

pub trait TranscriptSink: Send {
    /// A newly confirmed segment. Will never be revised.
    fn confirmed(&mut self, text: &str);
    /// The current revisable tail; replaces any previously reported tail.
    fn pending(&mut self, text: &str);
    /// The complete transcript at session end (or the partial transcript
    /// on abort).
    fn finished(&mut self, text: &str);

    fn handle(&mut self, event: &TranscriptEvent) {
        match event {
            TranscriptEvent::Confirmed { text } => self.confirmed(text),
            TranscriptEvent::Pending { text } => self.pending(text),
            TranscriptEvent::Finished { text } => self.finished(text),
        }
    }
}

/// Prints confirmed text as it stabilizes and the pending tail on a status
/// line. Good enough for CLI use.
#[derive(Default)]
pub struct StdoutSink;

impl TranscriptSink for StdoutSink {
    fn confirmed(&mut self, text: &str) {
        println!("✅ {}", text);
    }

    fn pending(&mut self, text: &str) {
        if !text.is_empty() {
            println!("…  {}", text);
        }
    }

    fn finished(&mut self, text: &str) {
        println!("📝 {}", text);
    }
}

/// Records everything it receives; used by tests to assert on delivery
/// order and append-only confirmation.
#[derive(Default)]
pub struct CollectingSink {
    pub confirmed: Vec<String>,
    pub pending: Vec<String>,
    pub finished: Option<String>,
}

impl TranscriptSink for CollectingSink {
    fn confirmed(&mut self, text: &str) {
        self.confirmed.push(text.to_string());
    }

    fn pending(&mut self, text: &str) {
        self.pending.push(text.to_string());
    }

    fn finished(&mut self, text: &str) {
        self.finished = Some(text.to_string());
    }
}
