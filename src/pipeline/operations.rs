//! Operation names a pipeline step may carry, resolved to the functions that run them.

use super::{Params, Step, StepName, from_params};
use crate::datarec::DataRec;
use crate::error::{Error, Result};
use crate::export::{Elliot, ExportInput, Exporter, RecBole};
use crate::io::Format;
use crate::processing::{
    Binarize, ColdFilter, FilterByRatingThreshold, FilterByTime, FilterByUserMeanRating,
    FilterOutDuplicatedInteractions, ItemKCore, IterativeKCore, NRoundsKCore, Processor,
    UserItemIterativeKCore, UserItemNRoundsKCore, UserKCore,
};
use crate::splitters::{
    LeaveNLast, LeaveNOut, LeaveOneLast, LeaveOneOut, LeaveRatioLast, LeaveRatioOut,
    RandomHoldOut, SplitResult, Splitter, TemporalHoldOut, TemporalThresholdSplit,
    UserStratifiedHoldOut,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// The only `load` operation: a registry dataset by name and version.
pub const REGISTRY_DATASET: &str = "registry_dataset";

pub type ProcessFn = fn(&DataRec, &Params) -> Result<DataRec>;
pub type SplitFn = fn(&DataRec, &Params) -> Result<SplitResult>;
pub type ExportFn = fn(&ExportInput<'_>, &Path, &Params) -> Result<Vec<PathBuf>>;

#[derive(Clone, Copy, Debug)]
pub struct ExporterEntry {
    pub requires_split: bool,
    pub run: ExportFn,
}

fn process_with<P: Processor>(data: &DataRec, params: &Params) -> Result<DataRec> {
    from_params::<P>(params)?.process(data)
}

fn split_with<S: Splitter>(data: &DataRec, params: &Params) -> Result<SplitResult> {
    from_params::<S>(params)?.split(data)
}

fn export_with<E: Exporter>(input: &ExportInput<'_>, folder: &Path, params: &Params) -> Result<Vec<PathBuf>> {
    from_params::<E>(params)?.export(input, folder)
}

fn exporter<E: Exporter>() -> ExporterEntry {
    ExporterEntry {
        requires_split: E::REQUIRES_SPLIT,
        run: export_with::<E>,
    }
}

/// Name-to-function tables for every step kind. Readers and writers resolve through
/// [`Format`].
#[derive(Debug)]
pub struct OperationTable {
    processors: BTreeMap<&'static str, ProcessFn>,
    splitters: BTreeMap<&'static str, SplitFn>,
    exporters: BTreeMap<&'static str, ExporterEntry>,
}

static OPERATIONS: LazyLock<OperationTable> = LazyLock::new(OperationTable::builtin);

/// The process-wide operation table.
#[must_use]
pub fn operation_table() -> &'static OperationTable {
    &OPERATIONS
}

impl OperationTable {
    fn builtin() -> Self {
        let mut processors: BTreeMap<&'static str, ProcessFn> = BTreeMap::new();
        processors.insert(Binarize::NAME, process_with::<Binarize>);
        processors.insert(ColdFilter::NAME, process_with::<ColdFilter>);
        processors.insert(FilterByRatingThreshold::NAME, process_with::<FilterByRatingThreshold>);
        processors.insert(FilterByUserMeanRating::NAME, process_with::<FilterByUserMeanRating>);
        processors.insert(
            FilterOutDuplicatedInteractions::NAME,
            process_with::<FilterOutDuplicatedInteractions>,
        );
        processors.insert(FilterByTime::NAME, process_with::<FilterByTime>);
        processors.insert(UserKCore::NAME, process_with::<UserKCore>);
        processors.insert(ItemKCore::NAME, process_with::<ItemKCore>);
        processors.insert(IterativeKCore::NAME, process_with::<IterativeKCore>);
        processors.insert(NRoundsKCore::NAME, process_with::<NRoundsKCore>);
        processors.insert(UserItemIterativeKCore::NAME, process_with::<UserItemIterativeKCore>);
        processors.insert(UserItemNRoundsKCore::NAME, process_with::<UserItemNRoundsKCore>);

        let mut splitters: BTreeMap<&'static str, SplitFn> = BTreeMap::new();
        splitters.insert(RandomHoldOut::NAME, split_with::<RandomHoldOut>);
        splitters.insert(UserStratifiedHoldOut::NAME, split_with::<UserStratifiedHoldOut>);
        splitters.insert(TemporalHoldOut::NAME, split_with::<TemporalHoldOut>);
        splitters.insert(TemporalThresholdSplit::NAME, split_with::<TemporalThresholdSplit>);
        splitters.insert(LeaveNOut::NAME, split_with::<LeaveNOut>);
        splitters.insert(LeaveOneOut::NAME, split_with::<LeaveOneOut>);
        splitters.insert(LeaveRatioOut::NAME, split_with::<LeaveRatioOut>);
        splitters.insert(LeaveNLast::NAME, split_with::<LeaveNLast>);
        splitters.insert(LeaveOneLast::NAME, split_with::<LeaveOneLast>);
        splitters.insert(LeaveRatioLast::NAME, split_with::<LeaveRatioLast>);

        let mut exporters = BTreeMap::new();
        exporters.insert(RecBole::NAME, exporter::<RecBole>());
        exporters.insert(Elliot::NAME, exporter::<Elliot>());

        Self {
            processors,
            splitters,
            exporters,
        }
    }

    #[must_use]
    pub fn processor(&self, name: &str) -> Option<ProcessFn> {
        self.processors.get(name).copied()
    }

    #[must_use]
    pub fn splitter(&self, name: &str) -> Option<SplitFn> {
        self.splitters.get(name).copied()
    }

    #[must_use]
    pub fn exporter(&self, name: &str) -> Option<ExporterEntry> {
        self.exporters.get(name).copied()
    }

    /// Every operation name valid for `step`, sorted.
    #[must_use]
    pub fn operations(&self, step: StepName) -> Vec<String> {
        let mut names: Vec<String> = match step {
            StepName::Load => vec![REGISTRY_DATASET.to_string()],
            StepName::Read => Format::ALL.iter().map(|f| f.reader_operation()).collect(),
            StepName::Write => Format::ALL.iter().map(|f| f.writer_operation()).collect(),
            StepName::Process => self.processors.keys().map(ToString::to_string).collect(),
            StepName::Split => self.splitters.keys().map(ToString::to_string).collect(),
            StepName::Export => self.exporters.keys().map(ToString::to_string).collect(),
        };
        names.sort();
        names
    }

    /// Check that `step` names a known operation.
    ///
    /// # Errors
    /// Returns a replay error naming the step kind and the unknown operation.
    pub fn check(&self, step: &Step) -> Result<()> {
        let op = step.operation.as_str();
        let known = match step.name {
            StepName::Load => op == REGISTRY_DATASET,
            StepName::Read => Format::from_reader_operation(op).is_some(),
            StepName::Write => Format::from_writer_operation(op).is_some(),
            StepName::Process => self.processors.contains_key(op),
            StepName::Split => self.splitters.contains_key(op),
            StepName::Export => self.exporters.contains_key(op),
        };
        if known {
            Ok(())
        } else {
            Err(Error::Replay(format!(
                "unknown {} operation '{op}'",
                step.name
            )))
        }
    }
}

