//! Session: one engine, named inputs in, named outputs out
//!
//! A run goes through these steps:
//!
//! 1. check input names against the graph and look for missing required inputs
//! 2. validate, describe and project every input into one input ledger
//! 3. run the engine and take ownership of every output at once
//! 4. dispose the input ledger
//! 5. un-project the outputs against their declared metadata into an output ledger
//!
//! Whatever step fails, every ledger filled so far is disposed before the
//! error is returned.

use std::sync::Arc;

use crate::config::ProjectionConfig;
use crate::descriptor::describe;
use crate::error::{TesseraError, TesseraResult};
use crate::host::{HostValue, NamedValue};
use crate::ledger::OwnershipLedger;
use crate::native::{OwnedValue, SharedEngine, ValueHandle};
use crate::project::Projector;
use crate::tessera_internal;
use crate::unproject::Unprojector;
use tessera_types::{GraphMetadata, NodeMetadata, ValueMetadata};

/// Host values produced by a run, with the ledger that keeps them valid
///
/// Call [`RunOutputs::dispose`] when done; dropping it disposes too but logs a warning.
#[derive(Debug)]
pub struct RunOutputs {
    values: Vec<NamedValue<'static>>,
    ledger: OwnershipLedger<'static>,
}

impl RunOutputs {
    /// Output by name
    pub fn get(&self, name: &str) -> Option<&HostValue<'static>> {
        self.values
            .iter()
            .find(|output| output.name == name)
            .map(|output| &output.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedValue<'static>> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ledger(&self) -> &OwnershipLedger<'static> {
        &self.ledger
    }

    /// Drop the host values and release everything the run left behind
    pub fn dispose(mut self) -> usize {
        self.values.clear();
        self.ledger.dispose()
    }

    /// Take the values and ledger apart; the caller becomes responsible for disposal
    pub fn into_parts(self) -> (Vec<NamedValue<'static>>, OwnershipLedger<'static>) {
        (self.values, self.ledger)
    }
}

/// Runs a graph on host values
pub struct Session {
    engine: SharedEngine,
    config: ProjectionConfig,
}

impl Session {
    pub fn new(engine: SharedEngine) -> Self {
        Self::with_config(engine, ProjectionConfig::default())
    }

    pub fn with_config(engine: SharedEngine, config: ProjectionConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphMetadata {
        self.engine.graph()
    }

    pub fn input_metadata(&self) -> &[NodeMetadata] {
        &self.graph().inputs
    }

    pub fn output_metadata(&self) -> &[NodeMetadata] {
        &self.graph().outputs
    }

    /// Run and return every declared output
    pub fn run(&self, inputs: &[NamedValue<'_>]) -> TesseraResult<RunOutputs> {
        let names = self.graph().output_names();
        self.run_with(inputs, &names)
    }

    /// Run and return the named outputs, in the order given
    pub fn run_with(
        &self,
        inputs: &[NamedValue<'_>],
        output_names: &[&str],
    ) -> TesseraResult<RunOutputs> {
        let output_meta = self.resolve_outputs(output_names)?;
        self.check_inputs(inputs)?;

        let mut input_ledger = OwnershipLedger::new();
        let projected = match self.project_inputs(inputs, &mut input_ledger) {
            Ok(projected) => projected,
            Err(err) => {
                input_ledger.dispose();
                return Err(err);
            }
        };

        let outputs = self.engine.run(&projected, output_names).map(|handles| {
            handles
                .into_iter()
                .map(|handle| OwnedValue::from_raw(Arc::clone(&self.engine), handle))
                .collect::<Vec<_>>()
        });
        input_ledger.dispose();
        let outputs = outputs?;

        if outputs.len() != output_names.len() {
            return Err(tessera_internal!(
                "engine returned {} outputs for {} names",
                outputs.len(),
                output_names.len()
            ));
        }

        let mut ledger = OwnershipLedger::new();
        match self.unproject_outputs(outputs, output_names, &output_meta, &mut ledger) {
            Ok(values) => Ok(RunOutputs { values, ledger }),
            Err(err) => {
                ledger.dispose();
                Err(err)
            }
        }
    }

    fn resolve_outputs(&self, output_names: &[&str]) -> TesseraResult<Vec<&ValueMetadata>> {
        output_names
            .iter()
            .map(|name| {
                self.graph()
                    .output(name)
                    .map(|node| &node.value)
                    .ok_or_else(|| TesseraError::not_found(format!("output '{}'", name)))
            })
            .collect()
    }

    fn check_inputs(&self, inputs: &[NamedValue<'_>]) -> TesseraResult<()> {
        let graph = self.graph();
        for (index, input) in inputs.iter().enumerate() {
            if graph.input(&input.name).is_none() {
                return Err(TesseraError::not_found(format!("input '{}'", input.name)));
            }
            if inputs[..index].iter().any(|other| other.name == input.name) {
                return Err(TesseraError::invalid_input(format!(
                    "input '{}' given more than once",
                    input.name
                )));
            }
        }

        for node in &graph.inputs {
            let supplied = inputs
                .iter()
                .any(|input| input.name == node.name && !input.value.is_absent());
            if !supplied && !node.value.is_optional() {
                return Err(TesseraError::invalid_input(format!(
                    "required input '{}' is missing",
                    node.name
                )));
            }
        }
        Ok(())
    }

    fn project_inputs<'a, 'v: 'a>(
        &self,
        inputs: &'a [NamedValue<'v>],
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<Vec<(&'a str, ValueHandle)>> {
        let projector = Projector::new(&self.engine, &self.config);
        let mut projected = Vec::with_capacity(inputs.len());
        for input in inputs {
            input.validate()?;
            let meta = &self
                .graph()
                .input(&input.name)
                .ok_or_else(|| TesseraError::not_found(format!("input '{}'", input.name)))?
                .value;
            let kind = describe(&input.value, meta)?;
            if input.value.is_absent() {
                log::debug!("skipping absent optional input '{}'", input.name);
                continue;
            }
            let handle = projector.project(&input.value, meta, ledger)?;
            log::debug!("input '{}' ({}) bound to {}", input.name, kind, handle);
            projected.push((input.name.as_str(), handle));
        }
        Ok(projected)
    }

    fn unproject_outputs(
        &self,
        outputs: Vec<OwnedValue>,
        output_names: &[&str],
        output_meta: &[&ValueMetadata],
        ledger: &mut OwnershipLedger<'static>,
    ) -> TesseraResult<Vec<NamedValue<'static>>> {
        let unprojector = Unprojector::new(&self.engine, &self.config);
        let mut values = Vec::with_capacity(outputs.len());
        for ((value, name), meta) in outputs.into_iter().zip(output_names).zip(output_meta) {
            let host = unprojector.unproject(value, Some(*meta), ledger)?;
            log::debug!("output '{}' unprojected as {}", name, host.kind());
            values.push(NamedValue::new(*name, host));
        }
        Ok(values)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("graph", self.graph())
            .field("config", &self.config)
            .finish()
    }
}
