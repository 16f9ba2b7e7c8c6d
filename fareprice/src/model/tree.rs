use serde::{Deserialize, Serialize};

use crate::model::{Error, Regressor, check_feature_count};

const LEAF: i64 = -1;

/// A fitted regression tree in flat array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise the sample
/// goes to `children_left[i]` if `x[feature[i]] <= threshold[i]` and to
/// `children_right[i]` if not. Node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl Tree {
    pub fn leaf(value: f64) -> Self {
        Self {
            children_left: vec![LEAF],
            children_right: vec![LEAF],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![value],
        }
    }

    fn n_nodes(&self) -> usize {
        self.value.len()
    }

    pub(crate) fn validate(&self, n_features: usize) -> Result<(), Error> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(Error::MalformedTree("tree has no nodes".to_string()));
        }
        if [
            self.children_left.len(),
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
        ]
        .iter()
        .any(|len| *len != n_nodes)
        {
            return Err(Error::MalformedTree(
                "node arrays have different lengths".to_string(),
            ));
        }

        let in_range = |idx: i64| idx >= 0 && (idx as usize) < n_nodes;
        for node in 0..n_nodes {
            if !self.value[node].is_finite() {
                return Err(Error::MalformedTree(format!(
                    "node {node} has a non-finite value"
                )));
            }
            if self.children_left[node] == LEAF {
                continue;
            }
            if !in_range(self.children_left[node]) || !in_range(self.children_right[node]) {
                return Err(Error::MalformedTree(format!(
                    "node {node} points to a child outside the tree"
                )));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(Error::MalformedTree(format!(
                    "node {node} splits on feature {feature}, but the model has {n_features} features"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn evaluate(&self, features: &[f64]) -> Result<f64, Error> {
        let mut node = 0;
        // A path longer than the node count can only mean a cycle.
        for _ in 0..self.n_nodes() {
            let (left, right, feature, threshold, value) = self.node(node)?;
            if left == LEAF {
                return Ok(value);
            }
            let x = usize::try_from(feature)
                .ok()
                .and_then(|feature| features.get(feature))
                .ok_or_else(|| {
                    Error::MalformedTree(format!("node {node} splits on missing feature {feature}"))
                })?;
            let next = if *x <= threshold { left } else { right };
            node = usize::try_from(next)
                .map_err(|_| Error::MalformedTree(format!("node {node} has child {next}")))?;
        }
        Err(Error::MalformedTree(
            "traversal did not reach a leaf".to_string(),
        ))
    }

    fn node(&self, node: usize) -> Result<(i64, i64, i64, f64, f64), Error> {
        match (
            self.children_left.get(node),
            self.children_right.get(node),
            self.feature.get(node),
            self.threshold.get(node),
            self.value.get(node),
        ) {
            (Some(left), Some(right), Some(feature), Some(threshold), Some(value)) => {
                Ok((*left, *right, *feature, *threshold, *value))
            }
            _ => Err(Error::MalformedTree(format!("node {node} does not exist"))),
        }
    }
}

fn validate_trees(trees: &[Tree], n_features: usize) -> Result<(), Error> {
    if trees.is_empty() {
        return Err(Error::InvalidArtifact("ensemble has no trees".to_string()));
    }
    trees.iter().try_for_each(|tree| tree.validate(n_features))
}

fn sum_trees(trees: &[Tree], features: &[f64]) -> Result<f64, Error> {
    trees.iter().map(|tree| tree.evaluate(features)).sum()
}

/// Random-forest regressor: the mean of all tree outputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forest {
    pub n_features: usize,
    pub trees: Vec<Tree>,
}

impl Forest {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        validate_trees(&self.trees, self.n_features)
    }
}

impl Regressor for Forest {
    fn kind(&self) -> &'static str {
        "forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64, Error> {
        check_feature_count(self.n_features, features)?;
        if self.trees.is_empty() {
            return Err(Error::InvalidArtifact("ensemble has no trees".to_string()));
        }
        Ok(sum_trees(&self.trees, features)? / self.trees.len() as f64)
    }
}

/// Gradient-boosted regressor: `base_score + learning_rate * Σ trees`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Boosting {
    pub n_features: usize,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<Tree>,
}

impl Boosting {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err(Error::InvalidArtifact(
                "boosting model has non-finite parameters".to_string(),
            ));
        }
        validate_trees(&self.trees, self.n_features)
    }
}

impl Regressor for Boosting {
    fn kind(&self) -> &'static str {
        "boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64, Error> {
        check_feature_count(self.n_features, features)?;
        Ok(self.base_score + self.learning_rate * sum_trees(&self.trees, features)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits on feature 1 at 2.0, then on feature 0 at 0.5 on the right.
    fn two_level_tree() -> Tree {
        Tree {
            children_left: vec![1, -1, 3, -1, -1],
            children_right: vec![2, -1, 4, -1, -1],
            feature: vec![1, -2, 0, -2, -2],
            threshold: vec![2.0, -2.0, 0.5, -2.0, -2.0],
            value: vec![0.0, 1.0, 0.0, 2.0, 3.0],
        }
    }

    #[test]
    fn evaluate_walks_to_leaf() {
        let tree = two_level_tree();
        tree.validate(2).unwrap();
        assert_eq!(tree.evaluate(&[0.0, 1.0]).unwrap(), 1.0);
        // Equal to the threshold goes left.
        assert_eq!(tree.evaluate(&[9.0, 2.0]).unwrap(), 1.0);
        assert_eq!(tree.evaluate(&[0.5, 3.0]).unwrap(), 2.0);
        assert_eq!(tree.evaluate(&[0.6, 3.0]).unwrap(), 3.0);
    }

    #[test]
    fn validate_rejects_bad_child() {
        let mut tree = two_level_tree();
        tree.children_right[2] = 7;
        assert!(matches!(
            tree.validate(2).unwrap_err(),
            Error::MalformedTree(_)
        ));
    }

    #[test]
    fn validate_rejects_unknown_feature() {
        let tree = two_level_tree();
        assert!(matches!(
            tree.validate(1).unwrap_err(),
            Error::MalformedTree(_)
        ));
    }

    #[test]
    fn validate_rejects_ragged_arrays() {
        let mut tree = two_level_tree();
        tree.threshold.pop();
        assert!(matches!(
            tree.validate(2).unwrap_err(),
            Error::MalformedTree(_)
        ));
    }

    #[test]
    fn evaluate_detects_cycle() {
        let tree = Tree {
            children_left: vec![1, 0],
            children_right: vec![1, 0],
            feature: vec![0, 0],
            threshold: vec![0.0, 0.0],
            value: vec![0.0, 0.0],
        };
        // Structurally valid, but never reaches a leaf.
        tree.validate(1).unwrap();
        assert!(matches!(
            tree.evaluate(&[1.0]).unwrap_err(),
            Error::MalformedTree(_)
        ));
    }

    #[test]
    fn forest_averages() {
        let forest = Forest {
            n_features: 2,
            trees: vec![two_level_tree(), Tree::leaf(5.0)],
        };
        forest.validate().unwrap();
        assert_eq!(forest.predict(&[0.0, 1.0]).unwrap(), 3.0);
        assert_eq!(forest.predict(&[1.0, 3.0]).unwrap(), 4.0);
    }

    #[test]
    fn empty_forest_is_invalid() {
        let forest = Forest {
            n_features: 2,
            trees: vec![],
        };
        assert!(matches!(
            forest.validate().unwrap_err(),
            Error::InvalidArtifact(_)
        ));
    }

    #[test]
    fn boosting_scales_and_offsets() {
        let boosting = Boosting {
            n_features: 2,
            base_score: 10.0,
            learning_rate: 0.5,
            trees: vec![two_level_tree(), Tree::leaf(4.0)],
        };
        boosting.validate().unwrap();
        assert_eq!(boosting.predict(&[0.0, 1.0]).unwrap(), 12.5);
        assert_eq!(boosting.predict(&[1.0, 3.0]).unwrap(), 13.5);
    }
}
