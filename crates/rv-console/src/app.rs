use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rv_console::{CommandLink, FeedSnapshot, LinkEvent};
use rv_core::ClientFrame;

pub enum Action {
    None,
    Quit,
    Submit(ClientFrame),
}

pub struct App {
    pub link: CommandLink,
    pub feed: FeedSnapshot,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            link: CommandLink::new(operator),
            feed: FeedSnapshot::default(),
            status_note: None,
        }
    }

    pub fn apply_link_event(&mut self, event: LinkEvent) {
        if let LinkEvent::Reconnecting { delay, .. } = &event {
            self.status_note = Some(format!(
                "command link lost, retrying in {}s",
                delay.as_secs_f32()
            ));
        } else if matches!(event, LinkEvent::Frame(_)) {
            self.status_note = None;
        }
        self.link.apply(event);
    }

    pub fn set_feed(&mut self, feed: FeedSnapshot) {
        self.feed = feed;
    }

    pub fn handle_input(&mut self, event: Event) -> Action {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            _ => Action::None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Enter => match self.link.submit() {
                Some(frame) => Action::Submit(frame),
                None => Action::None,
            },
            KeyCode::Backspace => {
                self.link.pop_char();
                Action::None
            }
            KeyCode::Char(ch) => {
                self.link.push_char(ch);
                Action::None
            }
            _ => Action::None,
        }
    }
}
