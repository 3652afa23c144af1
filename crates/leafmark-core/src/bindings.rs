//! TypeScript declarations for the JavaScript host.

use crate::link::LocationLink;
use crate::resolver::BacklinkHighlight;
use crate::store::{
    BookProgress, Location, PersistedDocument, ReadingStats, ReadingStatsEntry, Settings,
};
use std::fs;
use std::path::Path;
use ts_rs::TS;

const INDEX_CONTENT: &str = r#"export type { BacklinkHighlight } from "./BacklinkHighlight";
export type { BookProgress } from "./BookProgress";
export type { Location } from "./Location";
export type { LocationLink } from "./LocationLink";
export type { PersistedDocument } from "./PersistedDocument";
export type { ReadingStats } from "./ReadingStats";
export type { ReadingStatsEntry } from "./ReadingStatsEntry";
export type { Settings } from "./Settings";
"#;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Replace every `.ts` file in `out_dir` with freshly generated bindings.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<BacklinkHighlight>(out_dir)?;
    export_single_type::<BookProgress>(out_dir)?;
    export_single_type::<Location>(out_dir)?;
    export_single_type::<LocationLink>(out_dir)?;
    export_single_type::<PersistedDocument>(out_dir)?;
    export_single_type::<ReadingStats>(out_dir)?;
    export_single_type::<ReadingStatsEntry>(out_dir)?;
    export_single_type::<Settings>(out_dir)?;

    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, INDEX_CONTENT)
        .map_err(|err| format!("Failed to write {}: {err}", index_path.display()))
}
