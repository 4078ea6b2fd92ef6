// self
use crate::{_prelude::*, obs::Op, token::TokenScene};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used around async operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: Op, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("token_warden.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs an observer failure that was swallowed so the cycle could continue.
pub(crate) fn observer_failed(scene: TokenScene, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::error!(scene = scene.as_str(), "token observer failed: {error}");
	#[cfg(not(feature = "tracing"))]
	let _ = (scene, error);
}

/// Logs an auto-trigger replay dropped for lack of an async runtime.
pub(crate) fn auto_trigger_skipped(scene: TokenScene) {
	#[cfg(feature = "tracing")]
	tracing::warn!(scene = scene.as_str(), "no runtime available; auto-trigger replay skipped");
	#[cfg(not(feature = "tracing"))]
	let _ = scene;
}

/// Default error reporter used by the composite handler; silent without `tracing`.
pub(crate) fn report_message(message: &str) {
	#[cfg(feature = "tracing")]
	tracing::error!("response error: {message}");
	#[cfg(not(feature = "tracing"))]
	let _ = message;
}
