//! Behaviour kinds attachable to block states.
//!
//! The engine dispatches neighbour updates through the list of kinds a block
//! declares; the handlers themselves live in `ember-core`. Registration is
//! compile-time data: each block names its kinds in `vanilla_blocks`.

/// One aspect of a block's response to neighbour changes or scheduled
/// updates. A block may declare several; they run in declaration order and
/// are additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviourKind {
    /// Grass-like blocks mirror snow placed on top into their `snowy` state.
    SnowyTop,
    /// Plants that break without dirt-like soil below.
    NeedSoilBelow,
    /// Crops that break without farmland below.
    NeedFarmlandBelow,
    /// Breaks unless the block below presents a centred pole face.
    NeedPoleSupportBelow,
    /// Breaks unless the wall block behind `facing` presents a full face.
    NeedFullSupportBehindHorizontal,
    /// Buttons and levers: support direction depends on the attach face.
    NeedFullSupportAttached,
    /// Pressure plates: need a pole face (or hopper-like rim) below.
    NeedPlateSupportBelow,
    /// Carpets: any non-air block below will do.
    NeedNonAirBelow,
    /// Snow layers: their own support rule.
    SnowLayer,
    /// Cacti survive only on sand or another cactus.
    Cactus,
    /// Sugar cane checks soil and adjacent water; breaks one tick delayed.
    SugarCane,
    /// Bamboo: delayed break plus growth mirroring from above.
    Bamboo,
    /// Bamboo sapling: converts to bamboo when grown over.
    BambooSapling,
    /// Beds mirror occupancy with their other half, or break without it.
    Bed,
    /// Doors copy state between halves and need support below.
    DoorMatchOtherPart,
    /// Two-block plants: both halves must stay paired.
    TallPlant,
    /// Big dripleaf head: converts to stem when another head grows above.
    BigDripleaf,
    /// Big dripleaf stem: delayed break when the column is broken.
    BigDripleafStem,
    /// Stairs recompute their corner shape from the four horizontal sides.
    Stairs,
    /// Fences recompute the four connection flags.
    FenceConnect,
    /// Glass panes and iron bars recompute the four connection flags.
    PaneConnect,
    /// Walls recompute their side states.
    WallConnect,
    /// Fence gates pick up the in-wall flag from flanking walls.
    FenceGateConnect,
    /// Redstone wire: connection visuals plus signal propagation.
    RedstoneWire,
}
