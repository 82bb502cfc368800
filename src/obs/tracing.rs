// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Span wrapper used by session flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("master_session.flow", flow = kind.as_str(), stage) }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> FlowSpanGuard {
		FlowSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}

	/// Underlying span, for detached tasks that must outlive the caller.
	pub fn span(&self) -> &tracing::Span {
		&self.span
	}
}

/// RAII guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard {
	_guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}
