use std::collections::HashMap;
use std::time::Instant;

use anyhow::{bail, Result};
use eframe::egui::Color32;

pub mod connectors;
pub mod draw;
pub mod events;
pub mod input;
pub mod layout;
pub mod scene;
pub mod shapes;

#[cfg(test)]
mod test_interaction;

use crate::parser::{LoadOptions, ParseJob, TreeParser};
use events::{Listener, TreeEvent};
use layout::TreeType;
use scene::SceneGraph;
use shapes::NodeShape;

/// Index into the node arena of one [`Tree`].
pub type NodeId = usize;

pub const QUARTER_TURN: f32 = std::f32::consts::FRAC_PI_2;
pub const HALF_TURN: f32 = std::f32::consts::PI;
pub const FULL_TURN: f32 = std::f32::consts::TAU;

/// The boolean per-node attributes that can be cascaded through a subtree.
///
/// A closed set: cascading an unknown flag is unrepresentable at the API.
/// String-keyed surfaces go through [`BranchFlag::from_name`], which fails
/// loudly on a typo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchFlag {
    Selected,
    Highlighted,
    Hovered,
    Collapsed,
    Pruned,
    Interactive,
}

impl BranchFlag {
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "selected" => Self::Selected,
            "highlighted" => Self::Highlighted,
            "hovered" => Self::Hovered,
            "collapsed" => Self::Collapsed,
            "pruned" => Self::Pruned,
            "interactive" => Self::Interactive,
            _ => bail!("unknown node flag: {name}"),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::Highlighted => "highlighted",
            Self::Hovered => "hovered",
            Self::Collapsed => "collapsed",
            Self::Pruned => "pruned",
            Self::Interactive => "interactive",
        }
    }
}

/// Per-node label styling; unset fields fall back to the tree defaults.
#[derive(Debug, Clone, Default)]
pub struct LabelStyle {
    pub colour: Option<Color32>,
    pub text_size: Option<f32>,
    pub font: Option<String>,
    pub format: Option<String>,
}

/// Per-leaf terminal styling; unset fields fall back to branch colour and
/// the tree line width.
#[derive(Debug, Clone, Default)]
pub struct LeafStyle {
    pub line_width: Option<f32>,
    pub stroke_style: Option<Color32>,
    pub fill_style: Option<Color32>,
}

/// A fully resolved leaf style, ready for a shape renderer.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLeafStyle {
    pub line_width: f32,
    pub stroke_style: Color32,
    pub fill_style: Color32,
}

/// One category entry of leaf metadata, rendered by the stacked shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataEntry {
    pub colour: Color32,
    pub count: f64,
}

/// Partial style update applied by [`Branch::set_display`]; `None` fields
/// are left untouched.
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    pub colour: Option<Color32>,
    pub shape: Option<NodeShape>,
    pub size: Option<f32>,
    pub leaf_style: Option<LeafStyle>,
    pub label_style: Option<LabelStyle>,
}

/// One node of the tree plus the edge connecting it to its parent.
///
/// Geometry fields are computed by the active layout strategy and consumed
/// by the connector and shape renderers; the cached bounding box is written
/// by the draw pass and read by hit-testing.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    // geometry, in world units
    pub angle: f32,
    pub startx: f32,
    pub starty: f32,
    pub centerx: f32,
    pub centery: f32,
    pub interx: f32,
    pub intery: f32,
    pub min_child_angle: f32,
    pub max_child_angle: f32,

    // last drawn extent, for hit-testing
    pub minx: f32,
    pub maxx: f32,
    pub miny: f32,
    pub maxy: f32,

    pub branch_length: f64,
    pub total_branch_length: f64,

    pub colour: Option<Color32>,
    pub node_shape: NodeShape,
    pub radius: f32,
    pub label: Option<String>,
    pub label_style: LabelStyle,
    pub leaf_style: LeafStyle,
    pub metadata: Option<Vec<MetadataEntry>>,

    pub selected: bool,
    pub highlighted: bool,
    pub hovered: bool,
    pub collapsed: bool,
    pub pruned: bool,
    pub interactive: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: String::new(),
            parent: None,
            children: Vec::new(),
            angle: 0.0,
            startx: 0.0,
            starty: 0.0,
            centerx: 0.0,
            centery: 0.0,
            interx: 0.0,
            intery: 0.0,
            min_child_angle: FULL_TURN,
            max_child_angle: 0.0,
            minx: 0.0,
            maxx: 0.0,
            miny: 0.0,
            maxy: 0.0,
            branch_length: 0.0,
            total_branch_length: 0.0,
            colour: None,
            node_shape: NodeShape::Circle,
            radius: 10.0,
            label: None,
            label_style: LabelStyle::default(),
            leaf_style: LeafStyle::default(),
            metadata: None,
            selected: false,
            highlighted: false,
            hovered: false,
            collapsed: false,
            pruned: false,
            interactive: true,
        }
    }
}

impl Branch {
    pub fn leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted || self.hovered
    }

    pub fn flag(&self, flag: BranchFlag) -> bool {
        match flag {
            BranchFlag::Selected => self.selected,
            BranchFlag::Highlighted => self.highlighted,
            BranchFlag::Hovered => self.hovered,
            BranchFlag::Collapsed => self.collapsed,
            BranchFlag::Pruned => self.pruned,
            BranchFlag::Interactive => self.interactive,
        }
    }

    pub fn set_flag(&mut self, flag: BranchFlag, value: bool) {
        match flag {
            BranchFlag::Selected => self.selected = value,
            BranchFlag::Highlighted => self.highlighted = value,
            BranchFlag::Hovered => self.hovered = value,
            BranchFlag::Collapsed => self.collapsed = value,
            BranchFlag::Pruned => self.pruned = value,
            BranchFlag::Interactive => self.interactive = value,
        }
    }

    /// Collapsing a leaf is a no-op, not an error.
    pub fn collapse(&mut self) {
        self.collapsed = !self.leaf();
    }

    pub fn expand(&mut self) {
        self.collapsed = false;
    }

    pub fn toggle_collapsed(&mut self) {
        if self.collapsed {
            self.expand();
        } else {
            self.collapse();
        }
    }

    pub fn set_display(&mut self, options: &DisplayOptions) {
        if let Some(colour) = options.colour {
            self.colour = Some(colour);
        }
        if let Some(shape) = options.shape {
            self.node_shape = shape;
        }
        if let Some(size) = options.size {
            self.radius = size;
        }
        if let Some(leaf_style) = &options.leaf_style {
            self.leaf_style = leaf_style.clone();
        }
        if let Some(label_style) = &options.label_style {
            self.label_style = label_style.clone();
        }
    }

    pub fn get_label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

/// Predicate gating a flag cascade per node; re-evaluated at every visit.
pub type FlagPredicate = dyn Fn(&Branch, BranchFlag, bool) -> bool;

/// Auto-collapse configuration: nodes whose descendant-leaf count lies
/// strictly between `min` and `max` are collapsed after a build. Both
/// bounds are exclusive.
#[derive(Debug, Clone, Copy)]
pub struct CollapseRange {
    pub min: usize,
    pub max: usize,
    pub colour: Color32,
}

/// Hover feedback for a host UI: the internal node under the pointer and
/// its descendant-leaf count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tooltip {
    pub node: NodeId,
    pub child_count: usize,
    pub x: f32,
    pub y: f32,
}

/// Snapshot taken after a build so a subtree-focused redraw can be undone.
#[derive(Debug, Clone, Default)]
pub struct OriginalTree {
    pub root: Option<NodeId>,
    pub branches: HashMap<String, NodeId>,
    pub leaves: Vec<NodeId>,
    pub branch_lengths: HashMap<NodeId, f64>,
    pub parents: HashMap<NodeId, Option<NodeId>>,
}

pub(crate) struct Highlighter {
    pub node: NodeId,
    pub centerx: f32,
    pub centery: f32,
}

/// The visualization session: node arena, viewport transform, interaction
/// state and the draw pipeline.
pub struct Tree {
    pub nodes: Vec<Branch>,
    /// Node-id map; every stored node is reachable here by its unique id.
    pub branches: HashMap<String, NodeId>,
    /// Leaves in traversal order.
    pub leaves: Vec<NodeId>,
    pub root: Option<NodeId>,

    pub tree_type: TreeType,
    pub drawn: bool,
    pub scene: SceneGraph,
    pub string_representation: String,
    pub original_tree: Option<OriginalTree>,

    // viewport, offsets in logical pixels
    pub offsetx: f32,
    pub offsety: f32,
    pub zoom: f32,
    pub zoom_factor: f32,
    pub branch_scalar: f32,
    pub initial_branch_scalar: f32,
    pub current_branch_scale: f32,
    pub branch_scaling_step: f32,
    pub branch_scaling: bool,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub pixel_ratio: f32,

    // appearance defaults
    pub branch_colour: Color32,
    pub selected_colour: Color32,
    pub highlight_colour: Color32,
    pub highlight_width: f32,
    pub highlight_size: f32,
    pub base_node_size: f32,
    pub line_width: f32,
    pub text_size: f32,
    pub font: String,
    pub padding: f32,
    pub label_padding: f32,
    pub show_labels: bool,
    pub hover_label: bool,
    pub align_labels: bool,
    pub back_colour: bool,
    pub rect_multiplier: f32,
    pub default_collapsed: Option<CollapseRange>,

    // interaction behavior
    pub multi_select: bool,
    pub click_flag: BranchFlag,
    pub click_flag_predicate: Option<std::rc::Rc<FlagPredicate>>,
    pub internal_nodes_selectable: bool,
    pub unselect_on_click_away: bool,

    // interaction scratch state
    pub(crate) pickedup: bool,
    pub(crate) dragging: bool,
    pub(crate) startx: f32,
    pub(crate) starty: f32,
    pub(crate) origx: f32,
    pub(crate) origy: f32,
    pub(crate) last_wheel: Option<Instant>,
    pub(crate) hovering: bool,
    pub tooltip: Option<Tooltip>,

    pub max_branch_length: f64,
    pub(crate) max_label_width: HashMap<TreeType, f32>,
    pub(crate) highlighters: Vec<Highlighter>,
    pub(crate) listeners: Vec<Listener>,
    last_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let canvas_width = 400.0;
        let canvas_height = 400.0;
        Self {
            nodes: Vec::new(),
            branches: HashMap::new(),
            leaves: Vec::new(),
            root: None,
            tree_type: TreeType::Radial,
            drawn: false,
            scene: SceneGraph::default(),
            string_representation: String::new(),
            original_tree: None,
            offsetx: canvas_width / 2.0,
            offsety: canvas_height / 2.0,
            zoom: 1.0,
            zoom_factor: 0.2,
            branch_scalar: 1.0,
            initial_branch_scalar: 1.0,
            current_branch_scale: 1.0,
            branch_scaling_step: 1.2,
            branch_scaling: true,
            canvas_width,
            canvas_height,
            pixel_ratio: 1.0,
            branch_colour: Color32::BLACK,
            selected_colour: Color32::from_rgb(49, 151, 245),
            highlight_colour: Color32::from_rgb(49, 151, 245),
            highlight_width: 4.0,
            highlight_size: 2.0,
            base_node_size: 1.0,
            line_width: 1.0,
            text_size: 7.0,
            font: "sans-serif".to_string(),
            padding: 50.0,
            label_padding: 5.0,
            show_labels: false,
            hover_label: false,
            align_labels: true,
            back_colour: false,
            rect_multiplier: 10.0,
            default_collapsed: None,
            multi_select: true,
            click_flag: BranchFlag::Selected,
            click_flag_predicate: None,
            internal_nodes_selectable: true,
            unselect_on_click_away: true,
            pickedup: false,
            dragging: false,
            startx: 0.0,
            starty: 0.0,
            origx: 0.0,
            origy: 0.0,
            last_wheel: None,
            hovering: false,
            tooltip: None,
            max_branch_length: 0.0,
            max_label_width: HashMap::new(),
            highlighters: Vec::new(),
            listeners: Vec::new(),
            last_id: 0,
        }
    }

    pub fn branch(&self, id: NodeId) -> &Branch {
        &self.nodes[id]
    }

    pub fn branch_mut(&mut self, id: NodeId) -> &mut Branch {
        &mut self.nodes[id]
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.branches.get(id).copied()
    }

    /// Allocate a fresh branch in the arena; it is not reachable from the
    /// id map until [`Tree::store_node`] runs.
    pub fn create_branch(&mut self) -> NodeId {
        self.nodes.push(Branch::default());
        self.nodes.len() - 1
    }

    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn generate_id(&mut self) -> String {
        let id = format!("n{}", self.last_id);
        self.last_id += 1;
        id
    }

    /// Register a node in the id map and leaf list.
    ///
    /// A missing id is generated from the tree-scoped counter. A collision
    /// between two distinct internal nodes is resolved by regenerating the
    /// id; a leaf collision is fatal.
    pub fn store_node(&mut self, id: NodeId) -> Result<()> {
        if self.nodes[id].id.is_empty() {
            let fresh = self.generate_id();
            self.nodes[id].id = fresh;
        }

        while let Some(&existing) = self.branches.get(&self.nodes[id].id) {
            if existing == id {
                break;
            }
            if self.nodes[id].leaf() {
                bail!("two nodes on this tree share the id {}", self.nodes[id].id);
            }
            let fresh = self.generate_id();
            self.nodes[id].id = fresh;
        }

        self.branches.insert(self.nodes[id].id.clone(), id);
        if self.nodes[id].leaf() {
            self.leaves.push(id);
        }
        Ok(())
    }

    /// Rebuild the id map and leaf list from the current root.
    pub fn extract_nested_branches(&mut self) -> Result<()> {
        self.branches.clear();
        self.leaves.clear();
        if let Some(root) = self.root {
            self.store_node(root)?;
            self.extract_children(root)?;
        }
        Ok(())
    }

    fn extract_children(&mut self, id: NodeId) -> Result<()> {
        let children = self.nodes[id].children.clone();
        for child in children {
            self.store_node(child)?;
            self.extract_children(child)?;
        }
        Ok(())
    }

    fn set_total_length(&mut self, id: NodeId) {
        let total = match self.nodes[id].parent {
            Some(parent) => self.nodes[parent].total_branch_length + self.nodes[id].branch_length,
            None => self.nodes[id].branch_length,
        };
        self.nodes[id].total_branch_length = total;
        if total > self.max_branch_length {
            self.max_branch_length = total;
        }
        let children = self.nodes[id].children.clone();
        for child in children {
            self.set_total_length(child);
        }
    }

    /// Recompute the derived topology state after the structure changed:
    /// id map, leaf list and cumulative branch lengths.
    ///
    /// A tree whose branch lengths are all identical carries no usable
    /// length signal; its maximum length is treated as zero and the tree
    /// is rejected as degenerate.
    pub fn save_state(&mut self) -> Result<()> {
        self.extract_nested_branches()?;

        let Some(root) = self.root else {
            bail!("tree has no root");
        };
        self.nodes[root].branch_length = 0.0;
        self.max_branch_length = 0.0;
        self.set_total_length(root);

        let lengths: Vec<f64> = self
            .branches
            .values()
            .filter(|&&id| id != root)
            .map(|&id| self.nodes[id].branch_length)
            .collect();
        if let Some((&first, rest)) = lengths.split_first() {
            if rest.iter().all(|length| (length - first).abs() < f64::EPSILON) {
                self.max_branch_length = 0.0;
            }
        }

        if self.max_branch_length == 0.0 {
            bail!("all branches in the tree are identical");
        }
        Ok(())
    }

    /// Leaf-first, in-order collection of a per-leaf property.
    pub fn child_properties<T>(&self, id: NodeId, select: &impl Fn(&Branch) -> T) -> Vec<T> {
        if self.nodes[id].leaf() {
            return vec![select(&self.nodes[id])];
        }
        let mut values = Vec::new();
        for &child in &self.nodes[id].children {
            values.extend(self.child_properties(child, select));
        }
        values
    }

    pub fn child_ids(&self, id: NodeId) -> Vec<String> {
        self.child_properties(id, &|branch| branch.id.clone())
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        if self.nodes[id].leaf() {
            return 1;
        }
        self.nodes[id]
            .children
            .iter()
            .map(|&child| self.child_count(child))
            .sum()
    }

    /// Distinct colours among this node's immediate children.
    pub fn child_colours(&self, id: NodeId) -> Vec<Color32> {
        let mut colours = Vec::new();
        for &child in &self.nodes[id].children {
            let colour = if self.nodes[child].leaf() {
                self.nodes[child].colour.unwrap_or(self.branch_colour)
            } else {
                self.branch_colour_of(child)
            };
            if !colours.contains(&colour) {
                colours.push(colour);
            }
        }
        colours
    }

    /// Set `flag` to `value` on `id` and every descendant. The predicate
    /// gates the assignment per node; recursion continues regardless.
    pub fn cascade_flag(
        &mut self,
        id: NodeId,
        flag: BranchFlag,
        value: bool,
        predicate: Option<&FlagPredicate>,
    ) {
        let apply = predicate.map_or(true, |p| p(&self.nodes[id], flag, value));
        if apply {
            self.nodes[id].set_flag(flag, value);
        }
        let children = self.nodes[id].children.clone();
        for child in children {
            self.cascade_flag(child, flag, value, predicate);
        }
    }

    pub fn has_collapsed_ancestor(&self, id: NodeId) -> bool {
        match self.nodes[id].parent {
            Some(parent) => self.nodes[parent].collapsed || self.has_collapsed_ancestor(parent),
            None => false,
        }
    }

    /// Reverse the order of a node's children and redraw.
    pub fn rotate(&mut self, id: NodeId) {
        self.nodes[id].children.reverse();
        if let Err(err) = self.extract_nested_branches() {
            self.load_error(err.to_string());
            return;
        }
        self.draw(true);
    }

    /// Parenthesized serialization of the subtree rooted at `id`.
    pub fn nwk(&self, id: NodeId, is_root: bool) -> String {
        let branch = &self.nodes[id];
        if branch.leaf() {
            return format!("{}:{}", branch.get_label(), branch.branch_length);
        }
        let children: Vec<String> = branch
            .children
            .iter()
            .map(|&child| self.nwk(child, false))
            .collect();
        format!(
            "({}):{}{}",
            children.join(","),
            branch.branch_length,
            if is_root { ";" } else { "" }
        )
    }

    /// Newick export of the whole tree; the root's own length suffix is
    /// stripped and the string terminated by `;`.
    pub fn export_nwk(&self) -> String {
        let Some(root) = self.root else {
            return String::new();
        };
        let nwk = self.nwk(root, true);
        match nwk.rfind(')') {
            Some(index) => format!("{};", &nwk[..=index]),
            None => nwk,
        }
    }

    pub fn find_leaves(&self, pattern: &str, property: SearchProperty) -> Vec<NodeId> {
        self.leaves
            .iter()
            .copied()
            .filter(|&leaf| {
                let branch = &self.nodes[leaf];
                let value = match property {
                    SearchProperty::Id => Some(branch.id.as_str()),
                    SearchProperty::Label => branch.label.as_deref(),
                };
                value.is_some_and(|value| value.contains(pattern))
            })
            .collect()
    }

    pub fn get_node_ids_with_flag(&self, flag: BranchFlag, value: bool) -> Vec<String> {
        self.leaves
            .iter()
            .filter(|&&leaf| self.nodes[leaf].flag(flag) == value)
            .map(|&leaf| self.nodes[leaf].id.clone())
            .collect()
    }

    pub fn get_selected_node_ids(&self) -> Vec<String> {
        self.get_node_ids_with_flag(BranchFlag::Selected, true)
    }

    /// Attach metadata to leaves by id and redraw.
    pub fn set_metadata(&mut self, metadata: &HashMap<String, Vec<MetadataEntry>>) {
        for leaf in self.leaves.clone() {
            let entry = metadata.get(&self.nodes[leaf].id).cloned();
            self.nodes[leaf].metadata = entry;
        }
        self.draw(false);
    }

    /// Colour every branch by the dominant metadata category among its
    /// descendant leaves.
    pub fn colour_branches_by_leaf_metadata(&mut self) {
        let ids: Vec<NodeId> = self.branches.values().copied().collect();
        for id in ids {
            let lists = self.child_properties(id, &|branch| branch.metadata.clone());
            let mut counts: HashMap<Color32, f64> = HashMap::new();
            for entry in lists.into_iter().flatten().flatten() {
                *counts.entry(entry.colour).or_insert(0.0) += entry.count;
            }
            let dominant = counts
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(colour, _)| colour);
            if let Some(colour) = dominant {
                self.nodes[id].colour = Some(colour);
            }
        }
    }

    pub fn set_rect_multiplier(&mut self, multiplier: f32) {
        self.rect_multiplier = multiplier;
        self.draw(false);
    }

    /// Exclusively flag the listed leaves: every other leaf gets the
    /// negation. One update event is fired for the listed set.
    pub fn update_leaves(&mut self, leaves: &[NodeId], flag: BranchFlag, value: bool) {
        for leaf in self.leaves.clone() {
            self.nodes[leaf].set_flag(flag, !value);
        }
        let mut ids = Vec::with_capacity(leaves.len());
        for &leaf in leaves {
            self.nodes[leaf].set_flag(flag, value);
            ids.push(self.nodes[leaf].id.clone());
        }
        self.nodes_updated(ids, flag);
    }

    fn clear_state(&mut self) {
        self.root = None;
        self.leaves.clear();
        self.branches.clear();
        self.drawn = false;
    }

    fn save_original_tree(&mut self) {
        self.original_tree = Some(OriginalTree {
            root: self.root,
            branches: self.branches.clone(),
            leaves: self.leaves.clone(),
            branch_lengths: HashMap::new(),
            parents: HashMap::new(),
        });
    }

    /// Collapse every node whose descendant-leaf count falls strictly
    /// inside the configured range, top-down; subtrees of an already
    /// collapsed node are not re-checked.
    fn set_initial_collapsed_branches(&mut self, id: NodeId) {
        let Some(range) = self.default_collapsed else {
            return;
        };
        let count = self.child_count(id);
        if count > range.min && count < range.max {
            self.nodes[id].collapsed = true;
            return;
        }
        let children = self.nodes[id].children.clone();
        for child in children {
            self.set_initial_collapsed_branches(child);
        }
    }

    /// Parse `input` with an explicitly selected parser, or the first
    /// registered parser whose matcher accepts the input.
    pub fn load(&mut self, input: &str, options: &LoadOptions, callback: Option<LoadCallback>) {
        self.fire(TreeEvent::Loading);

        if let Some(format) = options.format.as_deref() {
            match crate::parser::by_name(format) {
                Some(parser) => return self.build(input, parser, options, callback),
                None => {
                    let err = anyhow::anyhow!("no parser registered for format {format:?}");
                    if let Some(callback) = callback {
                        callback(Some(&err));
                    }
                    self.load_error(err.to_string());
                    return;
                }
            }
        }

        for parser in crate::parser::all() {
            if parser.matches(input) {
                return self.build(input, parser, options, callback);
            }
        }

        let err = anyhow::anyhow!("string not recognised as a parseable tree format");
        if let Some(callback) = callback {
            callback(Some(&err));
        }
        self.load_error(err.to_string());
    }

    /// Construct the tree from parser output, then lay out and draw it.
    ///
    /// The parser may run its work synchronously or schedule it; the
    /// contract is only that it populates the root's subtree and produces
    /// exactly one outcome.
    pub fn build(
        &mut self,
        text: &str,
        parser: &dyn TreeParser,
        options: &LoadOptions,
        callback: Option<LoadCallback>,
    ) {
        self.original_tree = None;
        self.clear_state();
        self.nodes.clear();
        self.last_id = 0;

        let root = self.create_branch();
        self.nodes[root].id = "root".to_string();
        self.branches.insert("root".to_string(), root);
        self.root = Some(root);

        let job = ParseJob {
            text,
            root,
            options,
        };
        if let Err(err) = parser.parse(self, &job) {
            self.clear_state();
            if let Some(callback) = callback {
                callback(Some(&err));
            }
            self.load_error(format!("parse error: {err}"));
            return;
        }

        self.string_representation = text.to_string();

        if let Err(err) = self.save_state() {
            if let Some(callback) = callback {
                callback(Some(&err));
            }
            self.load_error(err.to_string());
            return;
        }

        self.set_initial_collapsed_branches(root);
        self.draw(false);
        self.save_original_tree();

        if let Some(callback) = callback {
            callback(None);
        }
        self.fire(TreeEvent::Loaded);
    }

    /// Re-root the view at `id` without discarding the original topology.
    pub fn redraw_from_branch(&mut self, id: NodeId) {
        if self.nodes.get(id).is_none() {
            return;
        }
        self.clear_state();
        self.restore_original_links();

        if let Some(original) = self.original_tree.as_mut() {
            original
                .branch_lengths
                .insert(id, self.nodes[id].branch_length);
            original.parents.insert(id, self.nodes[id].parent);
        }

        self.root = Some(id);
        self.nodes[id].parent = None;

        if let Err(err) = self.save_state() {
            self.load_error(err.to_string());
            return;
        }
        self.draw(false);
        let node = self.nodes[id].id.clone();
        self.fire(TreeEvent::SubtreeDrawn { node });
    }

    fn restore_original_links(&mut self) {
        let Some(original) = self.original_tree.as_ref() else {
            return;
        };
        let restores: Vec<(NodeId, f64, Option<NodeId>)> = original
            .branch_lengths
            .iter()
            .map(|(&id, &length)| (id, length, original.parents.get(&id).copied().flatten()))
            .collect();
        for (id, length, parent) in restores {
            self.nodes[id].branch_length = length;
            self.nodes[id].parent = parent;
        }
    }

    /// Undo a subtree focus using the snapshot taken at build time.
    pub fn reset_tree(&mut self) {
        let Some(original) = self.original_tree.as_ref() else {
            return;
        };
        let root = original.root;
        let branches = original.branches.clone();
        let leaves = original.leaves.clone();

        self.restore_original_links();
        if let Some(original) = self.original_tree.as_mut() {
            original.branch_lengths.clear();
            original.parents.clear();
        }

        self.branches = branches;
        self.leaves = leaves;
        self.root = root;
        self.drawn = false;

        if let Err(err) = self.save_state() {
            self.load_error(err.to_string());
            return;
        }
        self.draw(false);
    }

    /// Rebuild the full tree from the source text of the last load.
    pub fn redraw_original_tree(&mut self) {
        let text = self.string_representation.clone();
        self.load(&text, &LoadOptions::default(), None);
    }
}

pub type LoadCallback = Box<dyn FnOnce(Option<&anyhow::Error>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchProperty {
    #[default]
    Id,
    Label,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{LoadOptions, NEWICK};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn build_tree(newick: &str) -> Tree {
        let mut tree = Tree::new();
        tree.build(newick, &NEWICK, &LoadOptions::default(), None);
        tree
    }

    #[test]
    fn total_lengths_are_cumulative() {
        let tree = build_tree("((A:1,B:2):0.5,C:3);");
        for &leaf in &tree.leaves {
            let branch = &tree.nodes[leaf];
            let parent = branch.parent.expect("leaf has a parent");
            assert!(
                (branch.total_branch_length
                    - (tree.nodes[parent].total_branch_length + branch.branch_length))
                    .abs()
                    < 1e-12
            );
        }
        let deepest = tree
            .leaves
            .iter()
            .map(|&leaf| tree.nodes[leaf].total_branch_length)
            .fold(0.0f64, f64::max);
        assert_eq!(tree.max_branch_length, deepest);
        assert!((deepest - 3.0).abs() < 1e-12);
    }

    #[test]
    fn leaf_is_derived_and_collapse_is_noop_on_leaves() {
        let mut tree = build_tree("(A:1,B:2);");
        for id in 0..tree.nodes.len() {
            assert_eq!(tree.nodes[id].leaf(), tree.nodes[id].children.is_empty());
        }
        let leaf = tree.leaves[0];
        tree.nodes[leaf].collapse();
        assert!(!tree.nodes[leaf].collapsed);
        let root = tree.root.unwrap();
        tree.nodes[root].collapse();
        assert!(tree.nodes[root].collapsed);
    }

    #[test]
    fn cascade_flag_visits_whole_subtree() {
        let mut tree = build_tree("((A:1,B:2):0.5,C:3);");
        let root = tree.root.unwrap();
        tree.cascade_flag(root, BranchFlag::Selected, true, None);
        assert!(tree.nodes.iter().all(|branch| branch.selected));

        // predicate is re-evaluated per node, not inherited
        tree.cascade_flag(
            root,
            BranchFlag::Selected,
            false,
            Some(&|branch: &Branch, _, _| branch.leaf()),
        );
        for &leaf in &tree.leaves {
            assert!(!tree.nodes[leaf].selected);
        }
        assert!(tree.nodes[root].selected);
    }

    #[test]
    fn flag_names_round_trip_and_reject_typos() {
        assert_eq!(
            BranchFlag::from_name("selected").unwrap(),
            BranchFlag::Selected
        );
        assert!(BranchFlag::from_name("slected").is_err());
    }

    #[test]
    fn export_strips_root_length_and_terminates() {
        let tree = build_tree("(A:1,B:2,C:3);");
        assert_eq!(tree.export_nwk(), "(A:1,B:2,C:3);");
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].branch_length, 0.0);
    }

    #[test]
    fn export_round_trips_through_the_parser() {
        let tree = build_tree("((A:1,B:2):0.5,C:3);");
        let exported = tree.export_nwk();
        let rebuilt = build_tree(&exported);

        assert_eq!(rebuilt.leaves.len(), tree.leaves.len());
        for (&a, &b) in tree.leaves.iter().zip(rebuilt.leaves.iter()) {
            assert_eq!(tree.nodes[a].label, rebuilt.nodes[b].label);
            assert!((tree.nodes[a].branch_length - rebuilt.nodes[b].branch_length).abs() < 1e-9);
        }
        assert_eq!(rebuilt.export_nwk(), exported);
    }

    #[test]
    fn duplicate_leaf_ids_abort_the_build() {
        let seen = Rc::new(RefCell::new(false));
        let sink = Rc::clone(&seen);
        let mut tree = Tree::new();
        tree.build(
            "(A:1,A:2);",
            &NEWICK,
            &LoadOptions::default(),
            Some(Box::new(move |error| {
                *sink.borrow_mut() = error.is_some();
            })),
        );
        assert!(*seen.borrow());
        assert!(!tree.drawn);
    }

    #[test]
    fn internal_id_collisions_are_renamed() {
        let tree = build_tree("((A:1,B:2)X:0.5,(C:1,D:2)X:0.7);");
        // both internal nodes survive, one under a regenerated id
        assert_eq!(tree.leaves.len(), 4);
        assert_eq!(tree.branches.len(), 7);
    }

    #[test]
    fn identical_branch_lengths_are_degenerate() {
        let events: Rc<RefCell<Vec<TreeEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut tree = Tree::new();
        tree.add_listener(move |event| sink.borrow_mut().push(event.clone()));
        tree.build(
            "((A:2.5,B:2.5):2.5,C:2.5);",
            &NEWICK,
            &LoadOptions::default(),
            None,
        );

        assert!(!tree.drawn);
        assert!(events
            .borrow()
            .iter()
            .any(|event| matches!(event, TreeEvent::Error { .. })));
    }

    #[test]
    fn auto_collapse_bounds_are_exclusive() {
        let mut tree = Tree::new();
        tree.default_collapsed = Some(CollapseRange {
            min: 5,
            max: 10,
            colour: Color32::from_rgb(128, 0, 128),
        });
        // subtree X has min+1 = 6 leaves, subtree Y exactly min = 5
        let newick = "((a:1,b:2,c:1,d:2,e:1,f:2)X:1,(g:1,h:2,i:1,j:2,k:3)Y:2,z:5);";
        tree.build(newick, &NEWICK, &LoadOptions::default(), None);

        let x = tree.node_by_id("X").unwrap();
        let y = tree.node_by_id("Y").unwrap();
        assert!(tree.nodes[x].collapsed);
        assert!(!tree.nodes[y].collapsed);
        assert!(!tree.nodes[tree.root.unwrap()].collapsed);
    }

    #[test]
    fn selection_by_id_is_order_independent() {
        let mut tree = build_tree("(leaf1:1,leaf2:2,leaf3:3,leaf4:4,leaf5:5);");
        tree.select_nodes(&["leaf3", "leaf1"]);
        let mut selected = tree.get_selected_node_ids();
        selected.sort();
        assert_eq!(selected, vec!["leaf1".to_string(), "leaf3".to_string()]);

        tree.select_nodes(&["leaf1", "leaf3"]);
        let mut selected = tree.get_selected_node_ids();
        selected.sort();
        assert_eq!(selected, vec!["leaf1".to_string(), "leaf3".to_string()]);
    }

    #[test]
    fn find_leaves_matches_by_property() {
        let tree = build_tree("(alpha:1,beta:2,alphabet:3);");
        let by_id = tree.find_leaves("alpha", SearchProperty::Id);
        assert_eq!(by_id.len(), 2);
        let by_label = tree.find_leaves("beta", SearchProperty::Label);
        assert_eq!(by_label.len(), 1);
    }

    #[test]
    fn update_leaves_is_exclusive() {
        let mut tree = build_tree("(A:1,B:2,C:3);");
        let a = tree.node_by_id("A").unwrap();
        tree.update_leaves(&[a], BranchFlag::Highlighted, true);
        assert!(tree.nodes[a].highlighted);
        let b = tree.node_by_id("B").unwrap();
        assert!(!tree.nodes[b].highlighted);
    }
}
