//! Object recognition and visual search on top of the feature hierarchy.
//!
//! [`Model`] owns the immutable inputs of every cycle (configuration, filter
//! bank and compiled patch prototypes). [`SearchEpisode`] runs the attention
//! loop for one search image and is the only owner of a [`FocusState`].

pub mod attention;
pub mod feedback;
pub mod s2b;
pub mod similarity;

use crate::bank::FilterBank;
use crate::config::Config;
use crate::conv::s1_layer;
use crate::feature::FeatureHierarchy;
use crate::image::ImageView;
use crate::pool::c_layer;
use crate::template::sampler::{sample_patch, sample_vector};
use crate::template::{ObjectPrototypeSet, PatchPrototype, SparsePlan};
use crate::trace::{trace_event, trace_span};
use crate::util::{VisearchError, VisearchResult};
use attention::{
    inhibition_of_return, modulate_by_priority, priority_map, responses_at_fixation,
    top_down_modulation, Fixation, PriorityMap,
};
use feedback::{feedback_gain, ObjectResponses};
use rand::Rng;

/// Outcome of the C3 stage.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// Best-scoring object.
    pub object_id: usize,
    /// S3 score of every object.
    pub scores: Vec<f64>,
}

/// Runs S1 and C1 over one image.
pub fn c1_features(
    image: ImageView<'_, f64>,
    bank: &FilterBank,
    cfg: &Config,
) -> VisearchResult<FeatureHierarchy> {
    let s1 = s1_layer(image, bank, cfg)?;
    c_layer(&s1, cfg.pool_size)
}

/// Samples `cfg.num_patch_prototypes` patch prototypes from the C1 maps of
/// randomly chosen images.
///
/// Each image's C1 hierarchy is computed at most once.
pub fn build_patch_prototypes<R: Rng + ?Sized>(
    images: &[ImageView<'_, f64>],
    bank: &FilterBank,
    cfg: &Config,
    rng: &mut R,
) -> VisearchResult<Vec<PatchPrototype>> {
    let _span = trace_span!("build_patch_prototypes", images = images.len()).entered();
    if images.is_empty() {
        return Err(VisearchError::shape("build_patch_prototypes", "no images"));
    }

    let mut cache: Vec<Option<FeatureHierarchy>> = vec![None; images.len()];
    let mut prototypes = Vec::with_capacity(cfg.num_patch_prototypes);
    for _ in 0..cfg.num_patch_prototypes {
        let idx = rng.random_range(0..images.len());
        let c1 = match &mut cache[idx] {
            Some(c1) => &*c1,
            slot @ None => &*slot.insert(c1_features(images[idx], bank, cfg)?),
        };
        prototypes.push(sample_patch(
            c1,
            cfg.prototype_size,
            cfg.num_kept_weights,
            rng,
            cfg,
        )?);
    }
    trace_event!("patch_prototypes_built", count = prototypes.len());
    Ok(prototypes)
}

/// Computes the C2b table: one row per object image, in the given order.
pub fn build_object_responses(
    model: &Model,
    images: &[ImageView<'_, f64>],
) -> VisearchResult<ObjectResponses> {
    let _span = trace_span!("build_object_responses", objects = images.len()).entered();
    let rows = images
        .iter()
        .map(|&image| model.c2b(image))
        .collect::<VisearchResult<Vec<_>>>()?;
    ObjectResponses::new(rows)
}

/// Samples `num_vector_prototypes_per_object` vector prototypes from the S2b
/// maps of each object image; object ids follow the image order.
pub fn build_vector_prototypes<R: Rng + ?Sized>(
    model: &Model,
    images: &[ImageView<'_, f64>],
    rng: &mut R,
) -> VisearchResult<ObjectPrototypeSet> {
    let _span = trace_span!("build_vector_prototypes", objects = images.len()).entered();
    let cfg = model.config();
    let mut objects = Vec::with_capacity(images.len());
    for (object_id, &image) in images.iter().enumerate() {
        let s2b = model.s2b(image)?;
        let protos = (0..cfg.num_vector_prototypes_per_object)
            .map(|_| sample_vector(&s2b, object_id, rng, cfg))
            .collect::<VisearchResult<Vec<_>>>()?;
        objects.push(protos);
    }
    ObjectPrototypeSet::new(objects)
}

/// Immutable recognition model.
#[derive(Clone, Debug)]
pub struct Model {
    config: Config,
    bank: FilterBank,
    patches: Vec<PatchPrototype>,
    plans: Vec<SparsePlan>,
}

impl Model {
    /// Validates the configuration, builds the filter bank and compiles the
    /// patch prototypes.
    pub fn new(config: Config, patches: Vec<PatchPrototype>) -> VisearchResult<Self> {
        config.validate()?;
        let bank = FilterBank::build(&config.scale_sizes)?;
        Self::with_bank(config, bank, patches)
    }

    /// Like [`Model::new`] but reuses an already built filter bank.
    pub fn with_bank(
        config: Config,
        bank: FilterBank,
        patches: Vec<PatchPrototype>,
    ) -> VisearchResult<Self> {
        config.validate()?;
        if patches.is_empty() {
            return Err(VisearchError::shape("model", "no patch prototypes"));
        }
        let plans = patches.iter().map(PatchPrototype::plan).collect();
        Ok(Self {
            config,
            bank,
            patches,
            plans,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the filter bank.
    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }

    /// Returns the patch prototypes.
    pub fn patches(&self) -> &[PatchPrototype] {
        &self.patches
    }

    /// C1 hierarchy of an image.
    pub fn features(&self, image: ImageView<'_, f64>) -> VisearchResult<FeatureHierarchy> {
        c1_features(image, &self.bank, &self.config)
    }

    /// S2b hierarchy of an image.
    pub fn s2b(&self, image: ImageView<'_, f64>) -> VisearchResult<FeatureHierarchy> {
        let c1 = self.features(image)?;
        s2b::s2b_layer(&c1, &self.plans, &self.config)
    }

    /// C2b vector of an image.
    pub fn c2b(&self, image: ImageView<'_, f64>) -> VisearchResult<Vec<f64>> {
        Ok(s2b::c2b_responses(&self.s2b(image)?))
    }

    /// Runs S3 and C3 on an S2b hierarchy.
    pub fn classify(
        &self,
        s2b: &FeatureHierarchy,
        objects: &ObjectPrototypeSet,
    ) -> VisearchResult<Decision> {
        let scores = similarity::s3_scores(s2b, objects, &self.config)?;
        let object_id = similarity::c3_decision(&scores)?;
        Ok(Decision { object_id, scores })
    }

    /// Full recognition pass over one image.
    pub fn recognize(
        &self,
        image: ImageView<'_, f64>,
        objects: &ObjectPrototypeSet,
    ) -> VisearchResult<Decision> {
        self.classify(&self.s2b(image)?, objects)
    }

    /// Starts a visual search for `target` in `image`.
    pub fn episode(
        &self,
        image: ImageView<'_, f64>,
        responses: &ObjectResponses,
        target: usize,
    ) -> VisearchResult<SearchEpisode<'_>> {
        let s2b = self.s2b(image)?;
        SearchEpisode::new(self, s2b, image.width(), image.height(), responses, target)
    }
}

/// Current fixation and inhibition state of one search episode.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusState {
    fixation: Option<Fixation>,
    sigma: f64,
    fixations: usize,
}

impl FocusState {
    fn new(sigma: f64) -> Self {
        Self {
            fixation: None,
            sigma,
            fixations: 0,
        }
    }

    /// Most recent fixation, if any.
    pub fn fixation(&self) -> Option<Fixation> {
        self.fixation
    }

    /// Inhibition-of-return sigma in pixels.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Number of fixations made since the last reset.
    pub fn fixations(&self) -> usize {
        self.fixations
    }

    fn record(&mut self, fixation: Fixation) {
        self.fixation = Some(fixation);
        self.fixations += 1;
    }
}

/// Result of one attention cycle.
#[derive(Clone, Debug)]
pub struct SearchStep {
    /// Selected location.
    pub fixation: Fixation,
    /// Priority map after inhibition of return.
    pub priority: PriorityMap,
    /// Per-prototype S2b responses at the fixation, averaged over scales.
    pub responses: Vec<f64>,
}

/// Attention loop over one search image.
///
/// Each step modulates the current S2b maps by the target gain, projects them
/// to a priority map, fixates its maximum and suppresses the neighbourhood.
/// The suppressed map, scaled to a unit peak, multiplies the S2b maps used by
/// the next step.
#[derive(Clone, Debug)]
pub struct SearchEpisode<'m> {
    model: &'m Model,
    base: FeatureHierarchy,
    current: FeatureHierarchy,
    gain: Vec<f64>,
    width: usize,
    height: usize,
    focus: FocusState,
}

impl<'m> SearchEpisode<'m> {
    /// Prepares an episode from a precomputed S2b hierarchy of a
    /// `width x height` image.
    pub fn new(
        model: &'m Model,
        s2b: FeatureHierarchy,
        width: usize,
        height: usize,
        responses: &ObjectResponses,
        target: usize,
    ) -> VisearchResult<Self> {
        let cfg = model.config();
        let gain = feedback_gain(responses, target, cfg)?;
        if let Some(stack) = s2b.levels().iter().find(|s| s.depth() != gain.len()) {
            return Err(VisearchError::shape(
                "search_episode",
                format!("S2b depth {} but {} object responses", stack.depth(), gain.len()),
            ));
        }
        Ok(Self {
            model,
            current: s2b.clone(),
            base: s2b,
            gain,
            width,
            height,
            focus: FocusState::new(cfg.inhibition_sigma),
        })
    }

    /// Feedback gain applied at every step.
    pub fn gain(&self) -> &[f64] {
        &self.gain
    }

    /// Current focus state.
    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    /// Runs one attention cycle. On error the episode state is unchanged.
    pub fn step(&mut self) -> VisearchResult<SearchStep> {
        let cfg = self.model.config();
        let _span = trace_span!("search_step", fixation = self.focus.fixations()).entered();

        let lip = top_down_modulation(&self.current, &self.gain, cfg)?;
        let mut priority = priority_map(&lip, self.width, self.height, cfg)?;
        let fixation = inhibition_of_return(&mut priority, cfg.inhibition_gain, self.focus.sigma())?;
        let responses = responses_at_fixation(&self.base, fixation, self.width, self.height)?;
        let next = modulate_by_priority(&self.current, &priority.scaled_to_peak())?;

        self.current = next;
        self.focus.record(fixation);
        trace_event!("fixation", x = fixation.x, y = fixation.y);
        Ok(SearchStep {
            fixation,
            priority,
            responses,
        })
    }

    /// Clears the focus state and any accumulated suppression.
    pub fn reset(&mut self) {
        self.current = self.base.clone();
        self.focus = FocusState::new(self.model.config().inhibition_sigma);
    }
}
