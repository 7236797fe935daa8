//! Flattened tile hierarchy.
//!
//! The manifest's nested tiles are flattened into an arena so that traversal
//! and external-tileset grafting can address tiles by [`TileId`]. Transforms
//! are accumulated from the root and content URIs are resolved against the
//! manifest URL up front.

use glam::DMat4;
use reqwest::Url;

use crate::bounds::BoundingSphere;
use crate::types::{Refine, Tile, Tileset, UpAxis};

/// Index of a tile in a [`TileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub usize);

/// A tile with everything traversal needs precomputed.
#[derive(Debug, Clone)]
pub struct TileNode {
    pub parent: Option<TileId>,
    pub children: Vec<TileId>,
    pub depth: u32,
    pub geometric_error: f64,
    /// Effective refinement (inherited when the tile does not specify one).
    pub refine: Refine,
    /// Bounding sphere in the tileset frame.
    pub sphere: BoundingSphere,
    /// Accumulated transform from the tile frame to the tileset frame.
    pub transform: DMat4,
    /// Absolute content URLs.
    pub content: Vec<Url>,
    /// Up axis of glTF content in this tile.
    pub up_axis: UpAxis,
}

impl TileNode {
    /// True if the tile has anything to load.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Arena of tiles rooted at a single manifest.
#[derive(Debug, Clone)]
pub struct TileTree {
    nodes: Vec<TileNode>,
}

impl TileTree {
    /// Flatten a manifest fetched from `base_url`.
    pub fn from_tileset(tileset: &Tileset, base_url: &Url) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.insert(
            &tileset.root,
            None,
            DMat4::IDENTITY,
            Refine::Replace,
            tileset.gltf_up_axis(),
            base_url,
        );
        tree
    }

    /// The root tile.
    pub fn root(&self) -> TileId {
        TileId(0)
    }

    /// Look up a tile.
    pub fn get(&self, id: TileId) -> Option<&TileNode> {
        self.nodes.get(id.0)
    }

    /// Number of tiles in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree has no tiles (never the case for a tree built from a manifest).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounding sphere of the whole tileset.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.nodes[0].sphere
    }

    /// Attach an external tileset beneath `parent`.
    ///
    /// `content_url` is the parent's content reference that pointed at the
    /// external manifest; it is removed from the parent so it is not requested
    /// again. Returns the id of the grafted root.
    pub fn graft(&mut self, parent: TileId, content_url: &Url, tileset: &Tileset) -> TileId {
        let (transform, refine) = {
            let node = &mut self.nodes[parent.0];
            node.content.retain(|url| url != content_url);
            (node.transform, node.refine)
        };
        self.insert(
            &tileset.root,
            Some(parent),
            transform,
            refine,
            tileset.gltf_up_axis(),
            content_url,
        )
    }

    fn insert(
        &mut self,
        tile: &Tile,
        parent: Option<TileId>,
        parent_transform: DMat4,
        parent_refine: Refine,
        up_axis: UpAxis,
        base_url: &Url,
    ) -> TileId {
        let id = TileId(self.nodes.len());
        let transform = tile
            .transform
            .map_or(parent_transform, |m| parent_transform * DMat4::from_cols_array(&m));

        let sphere = BoundingSphere::from_volume(&tile.bounding_volume, &transform)
            .unwrap_or_else(|| BoundingSphere::new(transform.w_axis.truncate(), 0.0));

        let content = tile
            .content_uris()
            .filter_map(|uri| match base_url.join(uri) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(uri, "skipping content with unresolvable uri: {e}");
                    None
                }
            })
            .collect();

        let depth = parent.map_or(0, |p| self.nodes[p.0].depth + 1);
        let refine = tile.refine.unwrap_or(parent_refine);

        self.nodes.push(TileNode {
            parent,
            children: Vec::new(),
            depth,
            geometric_error: tile.geometric_error,
            refine,
            sphere,
            transform,
            content,
            up_axis,
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }

        for child in &tile.children {
            self.insert(child, Some(id), transform, refine, up_axis, base_url);
        }

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn manifest(json: &str) -> Tileset {
        Tileset::from_slice(json.as_bytes()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://tiles.example.com/city/tileset.json").unwrap()
    }

    const NESTED: &str = r#"{
        "asset": { "version": "1.0" },
        "geometricError": 200.0,
        "root": {
            "boundingVolume": { "sphere": [0, 0, 0, 100] },
            "geometricError": 50.0,
            "refine": "ADD",
            "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 1000,0,0,1],
            "content": { "uri": "root.glb" },
            "children": [
                {
                    "boundingVolume": { "sphere": [10, 0, 0, 20] },
                    "geometricError": 5.0,
                    "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,500,0,1],
                    "content": { "uri": "lod1/child.glb?v=2" }
                }
            ]
        }
    }"#;

    #[test]
    fn test_flatten_accumulates_transforms() {
        let tree = TileTree::from_tileset(&manifest(NESTED), &base());
        assert_eq!(tree.len(), 2);

        let root = tree.get(tree.root()).unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.sphere.center, DVec3::new(1000.0, 0.0, 0.0));
        assert_eq!(root.children, vec![TileId(1)]);

        let child = tree.get(TileId(1)).unwrap();
        assert_eq!(child.parent, Some(TileId(0)));
        assert_eq!(child.depth, 1);
        assert_eq!(child.sphere.center, DVec3::new(1010.0, 500.0, 0.0));
        // Refinement is inherited.
        assert_eq!(child.refine, Refine::Add);
    }

    #[test]
    fn test_content_urls_resolved() {
        let tree = TileTree::from_tileset(&manifest(NESTED), &base());
        let root = tree.get(TileId(0)).unwrap();
        assert_eq!(root.content[0].as_str(), "https://tiles.example.com/city/root.glb");

        let child = tree.get(TileId(1)).unwrap();
        assert_eq!(
            child.content[0].as_str(),
            "https://tiles.example.com/city/lod1/child.glb?v=2"
        );
    }

    #[test]
    fn test_graft_external_tileset() {
        let outer = manifest(
            r#"{
                "asset": { "version": "1.0" },
                "geometricError": 100.0,
                "root": {
                    "boundingVolume": { "sphere": [0, 0, 0, 100] },
                    "geometricError": 100.0,
                    "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,7,1],
                    "content": { "uri": "sub/tileset.json" }
                }
            }"#,
        );
        let inner = manifest(
            r#"{
                "asset": { "version": "1.0" },
                "geometricError": 10.0,
                "root": {
                    "boundingVolume": { "sphere": [0, 0, 0, 10] },
                    "geometricError": 1.0,
                    "content": { "uri": "leaf.glb" }
                }
            }"#,
        );

        let mut tree = TileTree::from_tileset(&outer, &base());
        let external = tree.get(TileId(0)).unwrap().content[0].clone();
        assert_eq!(
            external.as_str(),
            "https://tiles.example.com/city/sub/tileset.json"
        );

        let grafted = tree.graft(TileId(0), &external, &inner);
        assert_eq!(grafted, TileId(1));

        let root = tree.get(TileId(0)).unwrap();
        assert!(!root.has_content());
        assert_eq!(root.children, vec![grafted]);

        let leaf = tree.get(grafted).unwrap();
        assert_eq!(leaf.depth, 1);
        assert_eq!(leaf.sphere.center, DVec3::new(0.0, 0.0, 7.0));
        // Relative URIs in the external manifest resolve against its own URL.
        assert_eq!(
            leaf.content[0].as_str(),
            "https://tiles.example.com/city/sub/leaf.glb"
        );
    }
}
