/// Container for [TAGEPredictor](super::TAGEPredictor) runtime stats.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TAGEStats {
    /// Successful allocations
    pub alcs: usize,

    /// Failed allocations (all candidates were still useful)
    pub failed_alcs: usize,

    /// Predictions provided by the base component
    pub base_provided: usize,

    /// Predictions provided by each tagged component
    pub comp_provided: Vec<usize>,

    /// Mispredictions
    pub misses: usize,

    /// Number of times a plane of 'useful' bits was cleared
    pub resets: usize,

    /// Number of updates
    pub clk: usize,
}
impl TAGEStats {
    pub fn new(num_comp: usize) -> Self {
        Self {
            comp_provided: vec![0; num_comp],
            ..Default::default()
        }
    }
}
