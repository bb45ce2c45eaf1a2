//! Tiles command - print how an image plane is partitioned.

use std::path::PathBuf;

use elixir_tiles::{ImagePlane, TilePartitioner};
use serde_json::json;

use super::common::{load_config, resolve_plane, PlaneArgs};
use crate::error::CliError;

/// Arguments for the tiles command.
pub struct TilesArgs {
    pub config_path: Option<PathBuf>,
    pub plane: PlaneArgs,
    pub json: bool,
}

/// Run the tiles command.
pub fn run(args: TilesArgs) -> Result<(), CliError> {
    let config = load_config(args.config_path.as_deref())?;
    let plane = resolve_plane(&args.plane, &config)?;

    if args.json {
        let value = grid_json(&plane);
        let text =
            serde_json::to_string_pretty(&value).map_err(|e| CliError::Serialize(e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", grid_text(&plane));
    }
    Ok(())
}

fn grid_json(plane: &ImagePlane) -> serde_json::Value {
    let tiles: Vec<_> = TilePartitioner::new(*plane)
        .tiles()
        .iter()
        .map(|tile| json!({ "coord": tile.coord(), "rect": tile.rect() }))
        .collect();

    json!({
        "plane": plane,
        "tiles_x": plane.tile_count_x(),
        "tiles_y": plane.tile_count_y(),
        "total_pixels": plane.total_pixels(),
        "tiles": tiles,
    })
}

fn grid_text(plane: &ImagePlane) -> String {
    let mut out = format!(
        "Image plane: {}x{} ({} pixels), tile size {}\nGrid: {} x {} = {} tiles\n",
        plane.width(),
        plane.height(),
        plane.total_pixels(),
        plane.tile_size(),
        plane.tile_count_x(),
        plane.tile_count_y(),
        plane.tile_count(),
    );
    for tile in TilePartitioner::new(*plane).tiles() {
        let r = tile.rect();
        out.push_str(&format!(
            "  {:>4} {:>4}  [{}, {}) x [{}, {})  {}x{}\n",
            tile.tx(),
            tile.ty(),
            r.x0,
            r.x1,
            r.y0,
            r.y1,
            r.width(),
            r.height()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_json_shape() {
        let plane = ImagePlane::new(100, 100, 64).unwrap();
        let value = grid_json(&plane);
        assert_eq!(value["tiles_x"], 2);
        assert_eq!(value["tiles_y"], 2);
        assert_eq!(value["plane"]["tile_size"], 64);
        let tiles = value["tiles"].as_array().unwrap();
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[3]["coord"]["tx"], 1);
        assert_eq!(tiles[3]["rect"]["x1"], 100);
    }

    #[test]
    fn test_grid_text_lists_every_tile() {
        let plane = ImagePlane::new(10, 10, 64).unwrap();
        let text = grid_text(&plane);
        assert!(text.contains("Grid: 1 x 1 = 1 tiles"));
        assert!(text.contains("[0, 10) x [0, 10)  10x10"));
    }
}
