//! ASCII map dump for terminal review.
//!
//! One character per tile. Terrain first, then trees, structures and
//! agents on top. Player units are lowercase, opponent units
//! uppercase.

use orchard_core::agent::UnitKind;
use orchard_core::components::TilePos;
use orchard_core::factions::Faction;
use orchard_core::grid::{Fog, Terrain};
use orchard_core::session::Session;
use orchard_core::structure::StructureKind;

/// ASCII rendering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiConfig {
    /// Render the player's fog: unseen tiles blank, opponent entities
    /// only where currently visible.
    pub show_fog: bool,
    /// Append a legend and entity counts.
    pub show_legend: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_fog: false,
            show_legend: true,
        }
    }
}

fn terrain_char(terrain: Terrain) -> char {
    match terrain {
        Terrain::Grass => '.',
        Terrain::Dirt => ',',
        Terrain::Water => '~',
    }
}

fn unit_char(kind: UnitKind) -> char {
    match kind {
        UnitKind::Goose => 'g',
        UnitKind::Gander => 'a',
        UnitKind::Fox => 'F',
        UnitKind::Wolf => 'W',
    }
}

fn structure_char(kind: StructureKind) -> char {
    match kind {
        StructureKind::Nest => 'N',
        StructureKind::Granary => 'G',
        StructureKind::Barracks => 'B',
        StructureKind::Tower => '^',
        StructureKind::Den => 'D',
    }
}

/// Render the session's map as text, one row per line.
#[must_use]
pub fn render_map(session: &Session, config: AsciiConfig) -> String {
    let map = session.map();
    let width = map.width() as usize;
    let height = map.height() as usize;
    let mut grid: Vec<Vec<char>> = map
        .terrain_tiles()
        .chunks(width.max(1))
        .map(|row| row.iter().copied().map(terrain_char).collect())
        .collect();

    let visible = |tile: TilePos, faction: Faction| {
        !config.show_fog || faction == Faction::Player || map.fog(tile) == Fog::Visible
    };
    let mut put = |tile: TilePos, c: char| {
        let (Ok(x), Ok(y)) = (usize::try_from(tile.x), usize::try_from(tile.y)) else {
            return;
        };
        if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = c;
        }
    };

    for node in map.nodes() {
        put(node.tile, if node.is_exhausted() { 't' } else { 'T' });
    }
    for s in session.structures().iter().chain(session.enemy().structures()) {
        if s.is_alive() && visible(s.tile, s.faction) {
            put(s.tile, structure_char(s.kind()));
        }
    }
    for a in session.agents().iter().chain(session.enemy().agents()) {
        let tile = a.tile(map);
        if a.is_alive() && visible(tile, a.faction) {
            put(tile, unit_char(a.kind()));
        }
    }

    if config.show_fog {
        for (i, fog) in map.fog_tiles().iter().enumerate() {
            if *fog == Fog::Unseen {
                if let Some(cell) = grid.get_mut(i / width.max(1)).and_then(|row| row.get_mut(i % width.max(1))) {
                    *cell = ' ';
                }
            }
        }
    }

    let mut out = String::with_capacity((width + 1) * height + 256);
    for row in &grid {
        out.extend(row.iter());
        out.push('\n');
    }

    if config.show_legend {
        out.push_str(&format!(
            "tick {} | {}x{} | apples {} vs {} | agents {} vs {} | trees {}\n",
            session.tick(),
            width,
            height,
            session.economy().apples,
            session.enemy().economy.apples,
            session.agents().len(),
            session.enemy().agents().len(),
            map.nodes().iter().filter(|n| !n.is_exhausted()).count(),
        ));
        out.push_str(
            ". grass  , dirt  ~ water  T tree  t bare tree  N nest  G granary  B barracks  ^ tower  \
             g goose  a gander  D den  F fox  W wolf\n",
        );
    }
    out
}
