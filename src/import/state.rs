//! Element-event state machine
//!
//! Interprets the parser's event stream and drives record assembly. Only two
//! things matter in the document: `item` elements, which bracket one record,
//! and the recognized field elements inside them, whose text gets captured
//! and flushed at the closing tag. Everything else in the feed, RSS
//! scaffolding included, is structurally inert.

use super::builder::SongBuilder;
use super::cache::CategoryCache;
use super::ImportError;
use crate::model::{parse_release_date, FieldTag};
use crate::parser::ParseEvent;

const ITEM_TAG: &str = "item";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside any record; only an unprefixed `item` start matters
    Idle,
    /// Inside an `item`, between fields
    InSong,
    /// Inside a recognized field element, buffering its text
    Capturing(FieldTag),
}

/// What a single event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// A record was finalized and handed to the store
    SongCompleted,
}

/// Consumes parse events and drives the builder and the category cache
pub struct StreamStateMachine {
    state: State,
    text: String,
    builder: SongBuilder,
    cache: CategoryCache,
}

impl StreamStateMachine {
    pub fn new(builder: SongBuilder, cache: CategoryCache) -> Self {
        Self {
            state: State::Idle,
            text: String::new(),
            builder,
            cache,
        }
    }

    pub fn handle(&mut self, event: ParseEvent) -> Result<StepOutcome, ImportError> {
        match event {
            ParseEvent::ElementStart { local, prefix } => {
                self.element_start(&local, prefix.as_deref());
                Ok(StepOutcome::Continue)
            }
            ParseEvent::ElementEnd { local, prefix } => {
                self.element_end(&local, prefix.as_deref())
            }
            ParseEvent::Text(text) => {
                if matches!(self.state, State::Capturing(_)) {
                    self.text.push_str(&text);
                }
                Ok(StepOutcome::Continue)
            }
        }
    }

    fn element_start(&mut self, local: &str, prefix: Option<&str>) {
        match self.state {
            State::Idle => {
                if prefix.is_none() && local == ITEM_TAG {
                    self.state = State::InSong;
                    self.builder.begin_song();
                }
            }
            State::InSong | State::Capturing(_) => {
                if let Some(tag) = FieldTag::recognize(prefix, local) {
                    self.state = State::Capturing(tag);
                    self.text.clear();
                }
            }
        }
    }

    fn element_end(&mut self, local: &str, prefix: Option<&str>) -> Result<StepOutcome, ImportError> {
        if prefix.is_none() && local == ITEM_TAG {
            // A closing item outside a record is malformed nesting; ignore it
            // rather than corrupting state for the items that follow.
            if self.state == State::Idle {
                return Ok(StepOutcome::Continue);
            }
            self.state = State::Idle;
            self.text.clear();
            return Ok(if self.builder.finish_song()? {
                StepOutcome::SongCompleted
            } else {
                StepOutcome::Continue
            });
        }

        if let State::Capturing(tag) = self.state {
            if FieldTag::recognize(prefix, local) == Some(tag) {
                let value = std::mem::take(&mut self.text);
                self.flush_field(tag, value)?;
            } else {
                // Some nested element closed instead; the capture is void
                self.text.clear();
            }
            self.state = State::InSong;
        }
        Ok(StepOutcome::Continue)
    }

    fn flush_field(&mut self, tag: FieldTag, value: String) -> Result<(), ImportError> {
        match tag {
            FieldTag::Title => self.builder.set_title(value),
            FieldTag::Artist => self.builder.set_artist(value),
            FieldTag::Album => self.builder.set_album(value),
            // A date that fails the fixed format degrades to None
            FieldTag::ReleaseDate => self.builder.set_release_date(parse_release_date(&value)),
            FieldTag::Category => {
                let handle = self.cache.category_with_name(&value)?;
                self.builder.set_category(handle);
            }
        }
        Ok(())
    }

    pub fn cache(&self) -> &CategoryCache {
        &self.cache
    }

    pub fn builder(&self) -> &SongBuilder {
        &self.builder
    }
}
