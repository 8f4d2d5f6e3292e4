//! Arena-allocated regression tree shared by every ensemble adapter.

use rand::Rng;

use super::TreeParams;

/// How split thresholds are chosen at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitRule {
    /// Exhaustive search over midpoints between distinct values.
    Best,
    /// One uniform threshold per candidate feature (extremely randomized).
    Random,
}

#[derive(Debug, Clone)]
pub(crate) struct TreeSettings {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub rule: SplitRule,
}

impl TreeSettings {
    pub(crate) fn from_params(params: &TreeParams, rule: SplitRule) -> Self {
        Self {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features,
            rule,
        }
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Grow a tree on the rows of `features` selected by `indices`.
    ///
    /// `indices` may repeat rows (bootstrap samples). It must not be empty.
    pub(crate) fn fit<R: Rng>(
        features: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        settings: &TreeSettings,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(features, targets, indices, 0, settings, rng);
        tree
    }

    pub(crate) fn predict(&self, x: &[f64]) -> f64 {
        match self.nodes[self.leaf_index(x)] {
            TreeNode::Leaf { value } => value,
            TreeNode::Split { .. } => unreachable!("leaf_index always ends on a leaf"),
        }
    }

    /// Arena index of the leaf `x` falls into.
    pub(crate) fn leaf_index(&self, x: &[f64]) -> usize {
        let mut idx = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } = self.nodes[idx]
        {
            idx = if x[feature] <= threshold { left } else { right };
        }
        idx
    }

    /// Overwrite the value of a leaf; split nodes are left untouched.
    pub(crate) fn set_leaf_value(&mut self, idx: usize, new_value: f64) {
        if let TreeNode::Leaf { value } = &mut self.nodes[idx] {
            *value = new_value;
        }
    }

    fn push_leaf(&mut self, value: f64) -> usize {
        self.nodes.push(TreeNode::Leaf { value });
        self.nodes.len() - 1
    }

    fn build_node<R: Rng>(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        depth: usize,
        settings: &TreeSettings,
        rng: &mut R,
    ) -> usize {
        let n = indices.len();
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / n as f64;

        if n < settings.min_samples_split || settings.max_depth.is_some_and(|d| depth >= d) {
            return self.push_leaf(mean);
        }

        let total_var: f64 = indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum();
        if total_var == 0.0 {
            return self.push_leaf(mean);
        }

        let n_features = features[indices[0]].len();
        let max_features = settings
            .max_features
            .unwrap_or(n_features)
            .clamp(1, n_features.max(1));
        let candidates = partial_shuffle(n_features, max_features, rng);

        let mut best: Option<(f64, usize, f64)> = None;
        for &feat in &candidates {
            for threshold in thresholds(features, indices, feat, settings.rule, rng) {
                let stats = split_stats(features, targets, indices, feat, threshold);
                if stats.l_n < settings.min_samples_leaf || stats.r_n < settings.min_samples_leaf {
                    continue;
                }
                let score = total_var - stats.l_sse() - stats.r_sse();
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, feat, threshold));
                }
            }
        }

        let Some((score, feature, threshold)) = best else {
            return self.push_leaf(mean);
        };
        if score <= 0.0 {
            return self.push_leaf(mean);
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| features[i][feature] <= threshold);

        // Placeholder, replaced once both children exist.
        let node_idx = self.push_leaf(mean);
        let left = self.build_node(features, targets, &left_indices, depth + 1, settings, rng);
        let right = self.build_node(features, targets, &right_indices, depth + 1, settings, rng);

        self.nodes[node_idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }
}

/// Candidate thresholds for one feature at one node.
fn thresholds<R: Rng>(
    features: &[Vec<f64>],
    indices: &[usize],
    feature: usize,
    rule: SplitRule,
    rng: &mut R,
) -> Vec<f64> {
    match rule {
        SplitRule::Best => {
            let mut values: Vec<f64> = indices.iter().map(|&i| features[i][feature]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            values.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
        }
        SplitRule::Random => {
            let (lo, hi) = indices
                .iter()
                .map(|&i| features[i][feature])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if lo < hi {
                vec![rng.random_range(lo..hi)]
            } else {
                Vec::new()
            }
        }
    }
}

/// Select `k` random indices from `0..n` using partial Fisher-Yates shuffle.
fn partial_shuffle<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let k = k.min(n);
    for i in 0..k {
        let j = rng.random_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

struct SplitStats {
    l_sum: f64,
    l_sq: f64,
    l_n: usize,
    r_sum: f64,
    r_sq: f64,
    r_n: usize,
}

impl SplitStats {
    fn l_sse(&self) -> f64 {
        self.l_sq - self.l_sum * self.l_sum / self.l_n as f64
    }

    fn r_sse(&self) -> f64 {
        self.r_sq - self.r_sum * self.r_sum / self.r_n as f64
    }
}

fn split_stats(
    features: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    feature: usize,
    threshold: f64,
) -> SplitStats {
    let mut stats = SplitStats {
        l_sum: 0.0,
        l_sq: 0.0,
        l_n: 0,
        r_sum: 0.0,
        r_sq: 0.0,
        r_n: 0,
    };
    for &i in indices {
        let y = targets[i];
        if features[i][feature] <= threshold {
            stats.l_sum += y;
            stats.l_sq += y * y;
            stats.l_n += 1;
        } else {
            stats.r_sum += y;
            stats.r_sq += y * y;
            stats.r_n += 1;
        }
    }
    stats
}
