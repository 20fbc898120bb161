use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::clip::ClipSet;
use crate::coefficients::LanduseCoefficients;
use crate::error::{NaturwbError, Result};
use crate::keyed::KeyedTable;
use crate::model::{BfId, GenId, LanuId, NatId, ResultKey, SimId};

/// One level of the aggregation hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ChainNode {
    Reference,
    SoilGroup(GenId),
    Polygon(GenId, SimId),
    Region(GenId, SimId, NatId),
    Landuse(GenId, SimId, NatId, LanuId),
    Profile(GenId, SimId, NatId, LanuId, BfId),
}

/// One full identifier chain with its five coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub gen_id: GenId,
    pub sim_id: SimId,
    pub nat_id: NatId,
    pub lanu_id: LanuId,
    pub bf_id: BfId,
    /// Soil group, polygon, region, land-use and profile coefficient.
    pub factors: [f64; 5],
}

impl ChainRow {
    pub fn product(&self) -> f64 {
        self.factors.iter().product()
    }
}

/// Tree of all coefficient levels, from the reference down to the soil profiles.
///
/// Each edge carries the coefficient of its child level. The product along a
/// root-to-leaf path is the weight of one result row in the final reference,
/// so the path products must sum to 1.
pub struct CoefficientChain {
    graph: DiGraph<ChainNode, f64>,
    root: NodeIndex,
}

/// The five coefficient tables the chain is built from.
pub struct ChainTables<'a> {
    pub soil_group: &'a KeyedTable<GenId, f64>,
    pub polygon: &'a KeyedTable<(GenId, SimId), f64>,
    pub region: &'a KeyedTable<(SimId, NatId), f64>,
    pub landuse: &'a LanduseCoefficients,
    pub profile: &'a KeyedTable<ResultKey, f64>,
}

impl CoefficientChain {
    pub fn build(clip: &ClipSet, tables: &ChainTables<'_>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<ChainNode, NodeIndex> = HashMap::new();

        let get_or_insert = |map: &mut HashMap<ChainNode, NodeIndex>,
                             g: &mut DiGraph<ChainNode, f64>,
                             node: ChainNode|
         -> NodeIndex { *map.entry(node).or_insert_with(|| g.add_node(node)) };

        let root = get_or_insert(&mut node_map, &mut graph, ChainNode::Reference);

        for (&gen, &coef_gen) in tables.soil_group {
            let gen_idx = get_or_insert(&mut node_map, &mut graph, ChainNode::SoilGroup(gen));
            graph.add_edge(root, gen_idx, coef_gen);

            for (&(_, sim), &coef_sim) in tables.polygon.range((gen, SimId::MIN)..=(gen, SimId::MAX)) {
                let sim_idx =
                    get_or_insert(&mut node_map, &mut graph, ChainNode::Polygon(gen, sim));
                graph.add_edge(gen_idx, sim_idx, coef_sim);

                let nats = clip
                    .areas()
                    .range((sim, gen, NatId::MIN)..=(sim, gen, NatId::MAX))
                    .map(|(&(_, _, nat), _)| nat);
                for nat in nats {
                    let Some(&coef_nat) = tables.region.get(&(sim, nat)) else {
                        continue;
                    };
                    let nat_idx =
                        get_or_insert(&mut node_map, &mut graph, ChainNode::Region(gen, sim, nat));
                    graph.add_edge(sim_idx, nat_idx, coef_nat);

                    for (lanu, coef_lanu) in tables.landuse.for_polygon(sim, gen, nat) {
                        let lanu_idx = get_or_insert(
                            &mut node_map,
                            &mut graph,
                            ChainNode::Landuse(gen, sim, nat, lanu),
                        );
                        graph.add_edge(nat_idx, lanu_idx, coef_lanu.coef);

                        for (&(_, _, bf, lanu_of_profile), &coef_bfid) in tables
                            .profile
                            .range((sim, gen, BfId::MIN, LanuId::MIN)..=(sim, gen, BfId::MAX, LanuId::MAX))
                        {
                            if lanu_of_profile != lanu {
                                continue;
                            }
                            let bf_idx = get_or_insert(
                                &mut node_map,
                                &mut graph,
                                ChainNode::Profile(gen, sim, nat, lanu, bf),
                            );
                            graph.add_edge(lanu_idx, bf_idx, coef_bfid);
                        }
                    }
                }
            }
        }

        Self { graph, root }
    }

    /// All complete chains, i.e. root-to-profile paths, in key order.
    pub fn rows(&self) -> Vec<ChainRow> {
        let mut rows = Vec::new();
        let mut factors = Vec::with_capacity(5);
        self.collect_paths(self.root, &mut factors, &mut rows);
        rows.sort_by_key(|r| (r.gen_id, r.sim_id, r.nat_id, r.lanu_id, r.bf_id));
        rows
    }

    /// Sum of the coefficient products over all complete chains.
    pub fn total(&self) -> f64 {
        self.rows().iter().map(ChainRow::product).sum()
    }

    /// Fail if the coefficient products do not sum to 1 within `tolerance`.
    pub fn check(&self, tolerance: f64) -> Result<f64> {
        let total = self.total();
        if (total - 1.0).abs() > tolerance {
            return Err(NaturwbError::Consistency(format!(
                "the sum of all coefficient products is {total}, not 1"
            )));
        }
        Ok(total)
    }

    /// Share of each land-use in the final reference.
    pub fn landuse_distribution(&self) -> BTreeMap<LanuId, f64> {
        let mut shares = BTreeMap::new();
        for row in self.rows() {
            *shares.entry(row.lanu_id).or_insert(0.0) += row.product();
        }
        shares
    }

    /// Depth-first walk accumulating the coefficients along the current path.
    /// Only paths ending in a soil profile count; anything shorter lost its weight.
    fn collect_paths(&self, node: NodeIndex, factors: &mut Vec<f64>, rows: &mut Vec<ChainRow>) {
        if let ChainNode::Profile(gen_id, sim_id, nat_id, lanu_id, bf_id) = self.graph[node] {
            if let [g, s, n, l, b] = factors.as_slice() {
                rows.push(ChainRow {
                    gen_id,
                    sim_id,
                    nat_id,
                    lanu_id,
                    bf_id,
                    factors: [*g, *s, *n, *l, *b],
                });
            }
            return;
        }

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(target, _)| target.index());

        for (target, coef) in edges {
            factors.push(coef);
            self.collect_paths(target, factors, rows);
            factors.pop();
        }
    }
}
