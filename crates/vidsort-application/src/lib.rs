// SPDX-License-Identifier: GPL-3.0-or-later
pub mod events;
pub mod metadata;
pub mod organizer;
pub mod parser;
pub mod phash;
pub mod pipeline;
pub mod run;
pub mod scan;
pub mod similarity;

pub use events::{EventPublisher, InMemoryEventBus};
pub use metadata::{MetadataMatcher, MetadataSearch};
pub use organizer::{scrub, OrganizeError, Organizer};
pub use parser::{clean_title, parse, ParserError};
pub use phash::{hamming_similarity, hash_file, HashMatch, HashStore, PhashMatcher};
pub use pipeline::{
    AudioLayer, EscalationPipeline, HashLayer, PipelineOutcome, VisualGather,
};
pub use run::RunEngine;
pub use scan::scan_videos;
