//! Result shaping (C8): projection (including aggregation), alias rewrite,
//! ORDER BY, DISTINCT, SKIP/LIMIT, and the final column-major result shape.
//!
//! The pipeline keeps values as [`Cell`] — a richer intermediate than
//! [`Value`] — all the way through sorting, and only collapses to `Value`
//! in the last "post-projection" step. This is what lets ORDER BY compare
//! a multigraph edge-attribute column (a `(key, label) -> value` mapping)
//! by its lowest entry without losing that structure earlier, and what lets
//! an `ORDER BY`-only expression ride along as an extra column through
//! grouping/sorting before being dropped, exactly as the component's last
//! step name suggests.

use crate::error::{Result, ValidationError};
use crate::model::{attrs, labels_of, Attrs, PropertyGraph, Value};
use crate::query::ast::{AggKind, AttrPath, OrderKey, Projection, QueryAst, ReturnItem, SortDir};
use crate::query::hop::ExpandedMotif;
use crate::query::matcher::Binding;
use crate::query::motif::{Motif, MotifEdgeIdx};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One accepted (binding, motif-it-was-produced-against) pair, ready to be
/// shaped into output rows.
pub struct MatchRow<'e, Id: Copy + Eq + Ord> {
    /// The expanded motif this binding satisfies.
    pub expanded: &'e ExpandedMotif,
    /// The binding itself.
    pub binding: Binding<Id>,
}

/// Final, column-major query result: every key has a value list of the same
/// length. `columns` fixes the display order; `values` is keyed by each
/// column's alias.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    /// Output column names (aliases), in RETURN order.
    pub columns: Vec<String>,
    /// Column name to its list of row values.
    pub values: BTreeMap<String, Vec<Value>>,
}

impl QueryResult {
    /// Number of output rows (0 if there are no columns at all).
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| self.values[c].len()).unwrap_or(0)
    }

    /// Whether this result has zero rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An intermediate cell value, richer than [`Value`], carried through
/// grouping and ordering before the final "post-projection" collapse.
#[derive(Clone, Debug)]
enum Cell {
    Null,
    Scalar(Value),
    Attrs(Attrs),
    EdgeList(Vec<Attrs>),
    /// Multigraph edge-attribute column: one entry per `(edge key, label)`
    /// pair that coexists on the bound edge variable.
    EdgeMap(BTreeMap<(u32, String), Value>),
    /// Aggregation result computed per distinct label (only used when an
    /// aggregated column's source cells were themselves [`Cell::EdgeMap`]
    /// and more than one label appeared across the group).
    LabelMap(BTreeMap<String, Value>),
}

fn cells_equal(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::Null, Cell::Null) => true,
        (Cell::Scalar(x), Cell::Scalar(y)) => x.partial_cmp(y) == Some(Ordering::Equal),
        (Cell::Attrs(x), Cell::Attrs(y)) => x == y,
        (Cell::EdgeList(x), Cell::EdgeList(y)) => x == y,
        (Cell::EdgeMap(x), Cell::EdgeMap(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|((k1, v1), (k2, v2))| k1 == k2 && v1.partial_cmp(v2) == Some(Ordering::Equal)),
        (Cell::LabelMap(x), Cell::LabelMap(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|((k1, v1), (k2, v2))| k1 == k2 && v1.partial_cmp(v2) == Some(Ordering::Equal)),
        _ => false,
    }
}

fn cell_to_value(cell: Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Scalar(v) => v,
        Cell::Attrs(a) => Value::Map(a),
        Cell::EdgeList(list) => Value::List(list.into_iter().map(Value::Map).collect()),
        Cell::EdgeMap(m) => Value::Map(m.into_iter().map(|((key, label), v)| (format!("{key}:{label}"), v)).collect()),
        Cell::LabelMap(m) => Value::Map(m),
    }
}

fn node_id<Id: Copy + Eq + Ord>(expanded: &ExpandedMotif, binding: &Binding<Id>, var: &str) -> Option<Id> {
    let idx = *expanded.motif.var_index.get(var)?;
    binding.nodes.get(&idx).copied()
}

fn edge_whole_cell<G: PropertyGraph>(graph: &G, u: G::NodeId, v: G::NodeId) -> Cell {
    match graph.aggregated_edge(u, v) {
        // A single-hop edge variable always resolves to one attribute map;
        // when several parallel host edges satisfy the same motif edge,
        // there is no canonical key to prefer, so the lowest one is used.
        Some(agg) => agg.per_key.into_iter().next().map(|(_, a)| Cell::Attrs(a)).unwrap_or(Cell::Null),
        None => Cell::Null,
    }
}

fn edge_prop_cell<G: PropertyGraph>(graph: &G, u: G::NodeId, v: G::NodeId, prop: &str) -> Cell {
    let Some(agg) = graph.aggregated_edge(u, v) else {
        return Cell::Null;
    };
    if !graph.is_multi() || agg.per_key.len() <= 1 {
        return agg
            .per_key
            .values()
            .next()
            .and_then(|a| a.get(prop).cloned())
            .map(Cell::Scalar)
            .unwrap_or(Cell::Null);
    }
    let mut map = BTreeMap::new();
    for (key, edge_attrs) in &agg.per_key {
        let value = edge_attrs.get(prop).cloned().unwrap_or(Value::Null);
        let labels = labels_of(edge_attrs);
        if labels.is_empty() {
            map.insert((*key, String::new()), value);
        } else {
            for label in labels {
                map.insert((*key, label), value.clone());
            }
        }
    }
    Cell::EdgeMap(map)
}

fn resolve_edge_var<G: PropertyGraph>(
    graph: &G,
    orig_motif: &Motif,
    expanded: &ExpandedMotif,
    binding: &Binding<G::NodeId>,
    orig_edge_idx: MotifEdgeIdx,
    prop: Option<&str>,
) -> Cell {
    let Some(path_info) = expanded.paths.get(&orig_edge_idx) else {
        return Cell::Null;
    };
    if path_info.edges.is_empty() {
        // Zero-hop collapse: the variable is bound but no host edge was
        // actually traversed to produce it.
        return Cell::Null;
    }
    let single = path_info.edges.len() == 1;
    if let Some(prop) = prop {
        if !single {
            // Per-key narrowing of a variable-length edge chain has no
            // single principled value; mirrors the predicate evaluator's
            // same restriction.
            return Cell::Null;
        }
        let edge = &expanded.motif.edges[path_info.edges[0]];
        return match (binding.nodes.get(&edge.from), binding.nodes.get(&edge.to)) {
            (Some(&u), Some(&v)) => edge_prop_cell(graph, u, v, prop),
            _ => Cell::Null,
        };
    }

    let is_hop = orig_motif.edges[orig_edge_idx].is_hop;
    if is_hop {
        let edge = &expanded.motif.edges[path_info.edges[0]];
        match (binding.nodes.get(&edge.from), binding.nodes.get(&edge.to)) {
            (Some(&u), Some(&v)) => edge_whole_cell(graph, u, v),
            _ => Cell::Null,
        }
    } else {
        let mut out = Vec::with_capacity(path_info.edges.len());
        for &edge_idx in &path_info.edges {
            let edge = &expanded.motif.edges[edge_idx];
            if let (Some(&u), Some(&v)) = (binding.nodes.get(&edge.from), binding.nodes.get(&edge.to)) {
                let edge_attrs = graph
                    .aggregated_edge(u, v)
                    .and_then(|agg| agg.per_key.into_values().next())
                    .unwrap_or_else(attrs);
                out.push(edge_attrs);
            }
        }
        Cell::EdgeList(out)
    }
}

fn resolve_cell<G: PropertyGraph>(
    graph: &G,
    orig_motif: &Motif,
    edge_names: &BTreeMap<String, MotifEdgeIdx>,
    expanded: &ExpandedMotif,
    binding: &Binding<G::NodeId>,
    path: &AttrPath,
) -> Cell {
    match path {
        AttrPath::Id(var) => match node_id(expanded, binding, &var.0) {
            Some(host) => Cell::Scalar(graph.id_value(host)),
            None => Cell::Null,
        },
        AttrPath::Var(var) => {
            if let Some(&orig_idx) = edge_names.get(&var.0) {
                resolve_edge_var(graph, orig_motif, expanded, binding, orig_idx, None)
            } else {
                match node_id(expanded, binding, &var.0) {
                    Some(host) => Cell::Attrs(graph.node_attrs(host)),
                    None => Cell::Null,
                }
            }
        }
        AttrPath::Prop(var, prop) => {
            if let Some(&orig_idx) = edge_names.get(&var.0) {
                resolve_edge_var(graph, orig_motif, expanded, binding, orig_idx, Some(prop))
            } else {
                match node_id(expanded, binding, &var.0) {
                    Some(host) => Cell::Scalar(graph.node_attrs(host).get(prop).cloned().unwrap_or(Value::Null)),
                    None => Cell::Null,
                }
            }
        }
    }
}

fn attr_path_of(item: &ReturnItem) -> &AttrPath {
    match item {
        ReturnItem::Path(p) => p,
        ReturnItem::Agg(_, p) => p,
    }
}

fn agg_name(kind: AggKind) -> &'static str {
    match kind {
        AggKind::Count => "COUNT",
        AggKind::Sum => "SUM",
        AggKind::Avg => "AVG",
        AggKind::Min => "MIN",
        AggKind::Max => "MAX",
    }
}

fn attr_path_label(path: &AttrPath) -> String {
    match path {
        AttrPath::Id(v) => format!("id({})", v.0),
        AttrPath::Var(v) => v.0.clone(),
        AttrPath::Prop(v, p) => format!("{}.{}", v.0, p),
    }
}

fn default_alias(item: &ReturnItem) -> String {
    match item {
        ReturnItem::Path(p) => attr_path_label(p),
        ReturnItem::Agg(kind, p) => format!("{}({})", agg_name(*kind), attr_path_label(p)),
    }
}

fn return_item_eq(a: &ReturnItem, b: &ReturnItem) -> bool {
    fn path_eq(a: &AttrPath, b: &AttrPath) -> bool {
        match (a, b) {
            (AttrPath::Id(x), AttrPath::Id(y)) => x == y,
            (AttrPath::Var(x), AttrPath::Var(y)) => x == y,
            (AttrPath::Prop(x, p), AttrPath::Prop(y, q)) => x == y && p == q,
            _ => false,
        }
    }
    match (a, b) {
        (ReturnItem::Path(x), ReturnItem::Path(y)) => path_eq(x, y),
        (ReturnItem::Agg(k1, x), ReturnItem::Agg(k2, y)) => k1 == k2 && path_eq(x, y),
        _ => false,
    }
}

struct ColumnSpec {
    item: ReturnItem,
    alias: String,
    /// Whether this column is one of the query's own RETURN items (kept in
    /// the final result) as opposed to a synthetic column added only to
    /// carry a fresh `ORDER BY` expression through grouping/sorting.
    public: bool,
}

impl ColumnSpec {
    fn is_agg(&self) -> bool {
        matches!(self.item, ReturnItem::Agg(_, _))
    }
}

struct OrderPlanEntry {
    column: usize,
    dir: SortDir,
}

fn build_columns(ast: &QueryAst) -> Result<Vec<ColumnSpec>> {
    let mut columns = Vec::with_capacity(ast.projections.len());
    for Projection { item, alias } in &ast.projections {
        let alias = match alias {
            Some(a) => {
                if a.trim().is_empty() {
                    return Err(ValidationError::EmptyProjectionAlias.into());
                }
                a.clone()
            }
            None => default_alias(item),
        };
        columns.push(ColumnSpec {
            item: item.clone(),
            alias,
            public: true,
        });
    }
    Ok(columns)
}

fn build_order_plan(ast: &QueryAst, columns: &mut Vec<ColumnSpec>) -> Result<Vec<OrderPlanEntry>> {
    let mut plan = Vec::with_capacity(ast.order_by.len());
    for item in &ast.order_by {
        let (column, is_fresh, is_agg) = match &item.key {
            OrderKey::Column(name) => match columns.iter().position(|c| &c.alias == name) {
                Some(pos) => (pos, false, columns[pos].is_agg()),
                None => {
                    return Err(ValidationError::UnknownVariable {
                        var: name.clone(),
                        context: "ORDER BY",
                    }
                    .into())
                }
            },
            OrderKey::Item(ret_item) => match columns.iter().position(|c| return_item_eq(&c.item, ret_item)) {
                Some(pos) => (pos, false, columns[pos].is_agg()),
                None => {
                    let is_agg = matches!(ret_item, ReturnItem::Agg(_, _));
                    let alias = format!("__order_by_{}", columns.len());
                    columns.push(ColumnSpec {
                        item: ret_item.clone(),
                        alias,
                        public: false,
                    });
                    (columns.len() - 1, true, is_agg)
                }
            },
        };
        if ast.distinct && is_fresh && !is_agg {
            return Err(ValidationError::OrderByNonReturnedWithDistinct {
                column: match &item.key {
                    OrderKey::Column(name) => name.clone(),
                    OrderKey::Item(ret_item) => default_alias(ret_item),
                },
            }
            .into());
        }
        plan.push(OrderPlanEntry { column, dir: item.dir });
    }
    Ok(plan)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn cmp_scalar(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

fn aggregate_values(kind: AggKind, values: Vec<Option<Value>>) -> Value {
    match kind {
        AggKind::Count => Value::Int(values.iter().filter(|v| v.is_some()).count() as i64),
        AggKind::Sum => {
            let all_int = values.iter().all(|v| matches!(v, None | Some(Value::Int(_))));
            let total: f64 = values.iter().map(|v| v.as_ref().and_then(numeric).unwrap_or(0.0)).sum();
            if all_int {
                Value::Int(total as i64)
            } else {
                Value::Float(total)
            }
        }
        AggKind::Avg => {
            let denom = values.len().max(1) as f64;
            let total: f64 = values.iter().map(|v| v.as_ref().and_then(numeric).unwrap_or(0.0)).sum();
            Value::Float(total / denom)
        }
        AggKind::Max => values.into_iter().flatten().reduce(|a, b| if cmp_scalar(&a, &b) == Ordering::Less { b } else { a }).unwrap_or(Value::Null),
        AggKind::Min => values.into_iter().flatten().reduce(|a, b| if cmp_scalar(&a, &b) == Ordering::Greater { b } else { a }).unwrap_or(Value::Null),
    }
}

fn aggregate_column(kind: AggKind, cells: &[&Cell]) -> Cell {
    let any_edge_map = cells.iter().any(|c| matches!(c, Cell::EdgeMap(_)));
    if !any_edge_map {
        let values: Vec<Option<Value>> = cells
            .iter()
            .map(|c| match c {
                Cell::Scalar(v) if !v.is_null() => Some(v.clone()),
                _ => None,
            })
            .collect();
        return Cell::Scalar(aggregate_values(kind, values));
    }

    let mut per_label: BTreeMap<String, Vec<Option<Value>>> = BTreeMap::new();
    for cell in cells {
        match cell {
            Cell::EdgeMap(m) => {
                for ((_, label), v) in m {
                    per_label.entry(label.clone()).or_default().push(if v.is_null() { None } else { Some(v.clone()) });
                }
            }
            Cell::Scalar(v) => {
                per_label.entry(String::new()).or_default().push(if v.is_null() { None } else { Some(v.clone()) });
            }
            _ => {}
        }
    }
    let mut out: BTreeMap<String, Value> = per_label.into_iter().map(|(label, vals)| (label, aggregate_values(kind, vals))).collect();
    if out.len() == 1 {
        Cell::Scalar(out.pop_first().map(|(_, v)| v).unwrap_or(Value::Null))
    } else {
        Cell::LabelMap(out)
    }
}

fn sort_key(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Scalar(v) => v.clone(),
        Cell::EdgeMap(m) => {
            let mut vals: Vec<&Value> = m.values().collect();
            vals.sort_by(|a, b| cmp_scalar(a, b));
            vals.first().cloned().cloned().unwrap_or(Value::Null)
        }
        Cell::LabelMap(m) => {
            let mut vals: Vec<&Value> = m.values().collect();
            vals.sort_by(|a, b| cmp_scalar(a, b));
            vals.first().cloned().cloned().unwrap_or(Value::Null)
        }
        Cell::Attrs(_) | Cell::EdgeList(_) => Value::Null,
    }
}

/// Shapes a list of accepted matches into the final column-major result,
/// applying projection/aggregation, alias rewrite, ORDER BY, DISTINCT, and
/// SKIP/LIMIT in the order the spec fixes.
pub fn shape<G: PropertyGraph>(
    graph: &G,
    orig_motif: &Motif,
    edge_names: &BTreeMap<String, MotifEdgeIdx>,
    ast: &QueryAst,
    rows: &[MatchRow<'_, G::NodeId>],
) -> Result<QueryResult> {
    let mut columns = build_columns(ast)?;
    let order_plan = build_order_plan(ast, &mut columns)?;

    // Step 1: lookup — resolve every row against every column (public and
    // synthetic order-by-only columns alike).
    let mut matrix: Vec<Vec<Cell>> = Vec::with_capacity(rows.len());
    for row in rows {
        let resolved: Vec<Cell> = columns
            .iter()
            .map(|c| resolve_cell(graph, orig_motif, edge_names, row.expanded, &row.binding, attr_path_of(&c.item)))
            .collect();
        matrix.push(resolved);
    }

    // Step 2: aggregation, grouped by the tuple of non-aggregated *public*
    // return columns.
    let any_agg = columns.iter().any(ColumnSpec::is_agg);
    let mut shaped: Vec<Vec<Cell>> = if any_agg {
        let group_key_cols: Vec<usize> = columns.iter().enumerate().filter(|(_, c)| c.public && !c.is_agg()).map(|(i, _)| i).collect();
        let mut groups: Vec<(Vec<Cell>, Vec<usize>)> = Vec::new();
        'rows: for (row_idx, row) in matrix.iter().enumerate() {
            for (key, members) in groups.iter_mut() {
                if group_key_cols.iter().zip(key.iter()).all(|(&ci, kv)| cells_equal(&row[ci], kv)) {
                    members.push(row_idx);
                    continue 'rows;
                }
            }
            let key: Vec<Cell> = group_key_cols.iter().map(|&ci| row[ci].clone()).collect();
            groups.push((key, vec![row_idx]));
        }
        if groups.is_empty() && !matrix.is_empty() {
            // no group-by columns at all: the whole matrix is one group
            groups.push((Vec::new(), (0..matrix.len()).collect()));
        }
        groups
            .into_iter()
            .map(|(_, members)| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(ci, col)| {
                        if col.is_agg() {
                            let ReturnItem::Agg(kind, _) = col.item else { unreachable!() };
                            let cells: Vec<&Cell> = members.iter().map(|&r| &matrix[r][ci]).collect();
                            aggregate_column(kind, &cells)
                        } else {
                            matrix[members[0]][ci].clone()
                        }
                    })
                    .collect()
            })
            .collect()
    } else {
        matrix
    };

    // Step 4: ORDER BY (stable, multi-key).
    for entry in order_plan.iter().rev() {
        shaped.sort_by(|a, b| {
            let ord = cmp_scalar(&sort_key(&a[entry.column]), &sort_key(&b[entry.column]));
            match entry.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
    }

    // Step 5: DISTINCT, keyed by the returned (public) columns only.
    if ast.distinct {
        let public_idx: Vec<usize> = columns.iter().enumerate().filter(|(_, c)| c.public).map(|(i, _)| i).collect();
        let mut seen: Vec<Vec<Cell>> = Vec::new();
        shaped.retain(|row| {
            let key: Vec<Cell> = public_idx.iter().map(|&i| row[i].clone()).collect();
            if seen.iter().any(|k| k.len() == key.len() && k.iter().zip(key.iter()).all(|(a, b)| cells_equal(a, b))) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }

    // Step 6: SKIP / LIMIT.
    let skip = ast.skip.unwrap_or(0) as usize;
    let shaped: Vec<Vec<Cell>> = match ast.limit {
        Some(limit) => shaped.into_iter().skip(skip).take(limit as usize).collect(),
        None => shaped.into_iter().skip(skip).collect(),
    };

    // Step 7: post-projection — drop synthetic ORDER BY-only columns.
    let public: Vec<usize> = columns.iter().enumerate().filter(|(_, c)| c.public).map(|(i, _)| i).collect();
    let mut values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let column_names: Vec<String> = public.iter().map(|&i| columns[i].alias.clone()).collect();
    for &ci in &public {
        values.insert(columns[ci].alias.clone(), Vec::with_capacity(shaped.len()));
    }
    for row in shaped {
        for (slot, &ci) in public.iter().enumerate() {
            let alias = &column_names[slot];
            values.get_mut(alias).unwrap().push(cell_to_value(row[ci].clone()));
        }
    }

    Ok(QueryResult { columns: column_names, values })
}
