pub mod pca;
pub mod tsne;

use ndarray::prelude::*;

use crate::error::{EngineErr, Result};

/// The dimensionality-reduction strategy a layer displays through.
///
/// Each variant carries its own parameter struct; `LayerState::apply_changes`
/// dispatches on the variant, so no method-name strings cross any API.
#[derive(Clone, Debug, Default)]
pub enum ReductionMethod {
    #[default]
    None,
    Pca(PcaConfig),
    Tsne(TsneConfig),
}

/// PCA display settings plus the per-points-revision cache of scores,
/// variance percentages and first-component loadings.
#[derive(Clone, Debug, Default)]
pub struct PcaConfig {
    components: Vec<usize>,
    cache: Option<PcaCache>,
}

#[derive(Clone, Debug)]
struct PcaCache {
    revision: u64,
    scores: Array2<f32>,
    percent_variance: Vec<f32>,
    loading_scores: Vec<f32>,
}

impl PcaConfig {
    /// Creates a config showing the given principal components (0-based).
    pub fn new(components: Vec<usize>) -> Self {
        Self {
            components,
            cache: None,
        }
    }

    pub fn components(&self) -> &[usize] {
        &self.components
    }

    pub fn set_components(&mut self, components: Vec<usize>) {
        if components != self.components {
            self.components = components;
            self.cache = None;
        }
    }

    /// Percentage of variance explained per principal component, cached from
    /// the last projection.
    pub fn percent_variance(&self) -> Option<&[f32]> {
        self.cache.as_ref().map(|c| c.percent_variance.as_slice())
    }

    /// Loadings of the first principal component, cached from the last
    /// projection.
    pub fn loading_scores(&self) -> Option<&[f32]> {
        self.cache.as_ref().map(|c| c.loading_scores.as_slice())
    }

    /// Projects points onto the chosen components, reusing the cache while
    /// the points revision is unchanged.
    pub(crate) fn project(&mut self, points: ArrayView2<f32>, revision: u64) -> Array2<f32> {
        if let Some(cache) = &self.cache {
            if cache.revision == revision {
                return cache.scores.clone();
            }
        }

        let out = pca::reduce(points, &self.components);
        let scores = out.scores.clone();
        self.cache = Some(PcaCache {
            revision,
            scores: out.scores,
            percent_variance: out.percent_variance,
            loading_scores: out.loading_scores,
        });

        scores
    }
}

/// t-SNE hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TsneParams {
    pub dims: usize,
    pub perplexity: f32,
    pub learning_rate: f32,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            dims: 2,
            perplexity: 30.0,
            learning_rate: 200.0,
            iterations: 500,
            seed: 42,
        }
    }
}

impl TsneParams {
    /// Checks every hyperparameter against its valid range.
    pub fn validate(&self) -> Result<()> {
        range_check("dims", self.dims as f64, 1.0, 3.0)?;
        range_check("perplexity", self.perplexity as f64, 1.0, 100.0)?;
        range_check("learning_rate", self.learning_rate as f64, 1e-3, 1000.0)?;
        range_check("iterations", self.iterations as f64, 10.0, 5000.0)?;
        Ok(())
    }
}

fn range_check(name: &'static str, got: f64, min: f64, max: f64) -> Result<()> {
    if got < min || got > max {
        return Err(EngineErr::InvalidHyperParam { name, got, min, max });
    }
    Ok(())
}

/// t-SNE display settings.
///
/// Edits from the surface land in the staged copy and only take effect when
/// `apply_staged` commits them; the embedding cache survives until either
/// the points revision moves or a staged change is actually applied.
#[derive(Clone, Debug, Default)]
pub struct TsneConfig {
    committed: TsneParams,
    staged: TsneParams,
    cache: Option<TsneCache>,
}

#[derive(Clone, Debug)]
struct TsneCache {
    revision: u64,
    embedding: Array2<f32>,
}

impl TsneConfig {
    pub fn new(params: TsneParams) -> Self {
        Self {
            committed: params,
            staged: params,
            cache: None,
        }
    }

    pub fn committed(&self) -> &TsneParams {
        &self.committed
    }

    pub fn staged(&self) -> &TsneParams {
        &self.staged
    }

    /// Stages new hyperparameters without affecting the display.
    pub fn stage(&mut self, params: TsneParams) -> Result<()> {
        params.validate()?;
        self.staged = params;
        Ok(())
    }

    /// Commits the staged hyperparameters.
    ///
    /// # Returns
    /// Whether anything actually changed (and the cache was invalidated).
    pub fn apply_staged(&mut self) -> bool {
        if self.staged == self.committed {
            return false;
        }

        self.committed = self.staged;
        self.cache = None;
        true
    }

    /// Embeds points using the committed hyperparameters, reusing the cache
    /// while the points revision is unchanged.
    pub(crate) fn embed(&mut self, points: ArrayView2<f32>, revision: u64) -> Array2<f32> {
        if let Some(cache) = &self.cache {
            if cache.revision == revision {
                return cache.embedding.clone();
            }
        }

        let embedding = tsne::embed(points, &self.committed);
        self.cache = Some(TsneCache {
            revision,
            embedding: embedding.clone(),
        });

        embedding
    }
}

/// Resolves the axes a layer actually displays: the requested picks clipped
/// to the available dimensions, capped at 3, defaulting to the first axes.
pub(crate) fn pick_axes(dim: usize, requested: &[usize]) -> Vec<usize> {
    let picks: Vec<usize> = requested.iter().copied().filter(|&p| p < dim).take(3).collect();

    if picks.is_empty() {
        (0..dim.min(3)).collect()
    } else {
        picks
    }
}

/// Identity method: selects raw coordinate rows as display coordinates.
pub(crate) fn select_cords(points: ArrayView2<f32>, requested: &[usize]) -> Array2<f32> {
    let picks = pick_axes(points.nrows(), requested);
    let mut out = Array2::zeros((picks.len(), points.ncols()));

    for (row, &axis) in picks.iter().enumerate() {
        out.row_mut(row).assign(&points.row(axis));
    }

    out
}
