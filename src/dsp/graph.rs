//! Offline audio graph — sources, gains, and convolvers wired into a
//! destination and rendered to a single buffer in one pass.
//!
//! [`AudioGraph`] is the small capability surface the mix engine builds
//! against. [`OfflineGraph`] implements it with plain buffer math so the
//! same mix runs in a browser (via WASM), a desktop app, or a batch job.
//! A graph is created per render and consumed by [`AudioGraph::render`];
//! nothing is shared between renders.

use tracing::debug;

use super::buffer::AudioBuffer;
use super::convolver::Convolver;
use super::mixer::Mixer;
use super::source::BufferSource;
use crate::error::RenderError;

/// Handle to a node inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The operations a mix needs from an offline rendering backend.
pub trait AudioGraph {
    fn sample_rate(&self) -> u32;

    /// Allocate a silent buffer at the graph's sample rate.
    fn create_buffer(&self, channels: usize, frames: usize) -> AudioBuffer;

    fn create_gain(&mut self, gain: f32) -> NodeId;

    /// Add a one-shot player for `buffer`. Rate and detune multiply:
    /// effective speed is `playback_rate * 2^(detune / 1200)`.
    fn create_source(&mut self, buffer: AudioBuffer, playback_rate: f64, detune: f64) -> NodeId;

    fn create_convolver(&mut self, kernel: AudioBuffer) -> Result<NodeId, RenderError>;

    /// Route the output of `from` into `to`.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), RenderError>;

    /// Schedule a source to start `when` seconds into the render.
    fn start(&mut self, source: NodeId, when: f64) -> Result<(), RenderError>;

    fn destination(&self) -> NodeId;

    /// Render the whole graph. Consumes the graph.
    fn render(self) -> Result<AudioBuffer, RenderError>
    where
        Self: Sized;
}

#[derive(Debug)]
enum Node {
    Destination,
    Gain(f32),
    Source(BufferSource),
    Convolver(Convolver),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    New,
    Visiting,
    Done,
}

/// Pure-Rust offline renderer.
#[derive(Debug)]
pub struct OfflineGraph {
    sample_rate: u32,
    channels: usize,
    frames: usize,
    nodes: Vec<Node>,
    inputs: Vec<Vec<NodeId>>,
}

impl OfflineGraph {
    /// A graph rendering `frames` frames of `channels` channels.
    pub fn new(channels: usize, frames: usize, sample_rate: u32) -> Self {
        OfflineGraph {
            sample_rate,
            channels,
            frames,
            nodes: vec![Node::Destination],
            inputs: vec![Vec::new()],
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.inputs.push(Vec::new());
        NodeId(self.nodes.len() - 1)
    }

    fn check(&self, id: NodeId) -> Result<(), RenderError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(RenderError::UnknownNode(id.0))
        }
    }

    /// Depth-first post-order from the destination; inputs come first.
    fn visit(&self, id: usize, marks: &mut [Mark], order: &mut Vec<usize>) -> Result<(), RenderError> {
        match marks[id] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(RenderError::Cycle(id)),
            Mark::New => {}
        }
        marks[id] = Mark::Visiting;
        for input in &self.inputs[id] {
            self.visit(input.0, marks, order)?;
        }
        marks[id] = Mark::Done;
        order.push(id);
        Ok(())
    }
}

/// Sum `inputs` into one gained bus. Each input's output is released once
/// its last consumer has read it; a sole input that nothing else reads is
/// reused in place instead of copied.
fn mix_inputs(
    inputs: &[NodeId],
    gain: f32,
    frames: usize,
    outputs: &mut [Option<Vec<f32>>],
    pending: &mut [usize],
) -> Vec<f32> {
    if let [only] = inputs {
        let i = only.index();
        pending[i] -= 1;
        let signal = if pending[i] == 0 {
            outputs[i].take()
        } else {
            outputs[i].clone()
        };
        return Mixer::from_buffer(gain, signal.unwrap_or_else(|| vec![0.0; frames])).output();
    }

    let mut bus = Mixer::new(gain);
    bus.clear(frames);
    for input in inputs {
        let i = input.index();
        if let Some(signal) = &outputs[i] {
            bus.add_signal(signal);
        }
        pending[i] -= 1;
        if pending[i] == 0 {
            outputs[i] = None;
        }
    }
    bus.output()
}

impl AudioGraph for OfflineGraph {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_buffer(&self, channels: usize, frames: usize) -> AudioBuffer {
        AudioBuffer::silent(channels, frames, self.sample_rate)
    }

    fn create_gain(&mut self, gain: f32) -> NodeId {
        self.push(Node::Gain(gain))
    }

    fn create_source(&mut self, buffer: AudioBuffer, playback_rate: f64, detune: f64) -> NodeId {
        self.push(Node::Source(BufferSource::new(buffer, playback_rate, detune)))
    }

    fn create_convolver(&mut self, kernel: AudioBuffer) -> Result<NodeId, RenderError> {
        let convolver = Convolver::new(kernel)?;
        Ok(self.push(Node::Convolver(convolver)))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), RenderError> {
        self.check(from)?;
        self.check(to)?;
        if matches!(self.nodes[to.0], Node::Source(_)) {
            return Err(RenderError::SourceInput(to.0));
        }
        self.inputs[to.0].push(from);
        Ok(())
    }

    fn start(&mut self, source: NodeId, when: f64) -> Result<(), RenderError> {
        self.check(source)?;
        if !when.is_finite() || when < 0.0 {
            return Err(RenderError::InvalidStartTime(when));
        }
        let frame = (when * self.sample_rate as f64).round() as usize;
        match &mut self.nodes[source.0] {
            Node::Source(src) => {
                src.start(frame);
                Ok(())
            }
            _ => Err(RenderError::NotASource(source.0)),
        }
    }

    fn destination(&self) -> NodeId {
        NodeId(0)
    }

    fn render(self) -> Result<AudioBuffer, RenderError> {
        let mut marks = vec![Mark::New; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        self.visit(0, &mut marks, &mut order)?;

        debug!(
            nodes = self.nodes.len(),
            active = order.len(),
            frames = self.frames,
            sample_rate = self.sample_rate,
            "rendering offline graph"
        );

        let OfflineGraph {
            sample_rate,
            channels,
            frames,
            nodes,
            inputs,
        } = self;

        // Reads still owed to each node's output by nodes later in `order`.
        let mut pending = vec![0usize; nodes.len()];
        for &id in &order {
            for input in &inputs[id] {
                pending[input.index()] += 1;
            }
        }

        let mut nodes: Vec<Option<Node>> = nodes.into_iter().map(Some).collect();
        let mut outputs: Vec<Option<Vec<f32>>> = vec![None; nodes.len()];
        for &id in &order {
            let Some(node) = nodes[id].take() else {
                continue;
            };
            let signal = match node {
                Node::Source(src) => src.render(frames, sample_rate),
                Node::Gain(gain) => mix_inputs(&inputs[id], gain, frames, &mut outputs, &mut pending),
                Node::Destination => mix_inputs(&inputs[id], 1.0, frames, &mut outputs, &mut pending),
                Node::Convolver(conv) => {
                    let input = mix_inputs(&inputs[id], 1.0, frames, &mut outputs, &mut pending);
                    conv.process(&input, frames)
                }
            };
            outputs[id] = Some(signal);
        }

        let mixed = outputs[0].take().unwrap_or_else(|| vec![0.0; frames]);
        let channels = match channels {
            0 => Vec::new(),
            n => vec![mixed; n],
        };
        Ok(AudioBuffer::from_equal_channels(channels, sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> AudioBuffer {
        AudioBuffer::mono((0..len).map(|i| ((i as f32) * 0.1).sin() * 0.5).collect(), 24000)
    }

    #[test]
    fn empty_graph_renders_silence() {
        let graph = OfflineGraph::new(1, 100, 24000);
        let out = graph.render().unwrap();
        assert_eq!(out.frames(), 100);
        assert_eq!(out.energy(), 0.0);
    }

    #[test]
    fn source_through_gain() {
        let mut g = OfflineGraph::new(1, 10, 24000);
        let src = g.create_source(AudioBuffer::mono(vec![1.0; 10], 24000), 1.0, 0.0);
        let gain = g.create_gain(0.5);
        g.connect(src, gain).unwrap();
        g.connect(gain, g.destination()).unwrap();
        g.start(src, 0.0).unwrap();

        let out = g.render().unwrap();
        assert!(out.channel(0).unwrap().iter().all(|&s| s == 0.5));
    }

    #[test]
    fn fan_out_and_sum() {
        let mut g = OfflineGraph::new(1, 4, 24000);
        let src = g.create_source(AudioBuffer::mono(vec![0.25; 4], 24000), 1.0, 0.0);
        let a = g.create_gain(1.0);
        let b = g.create_gain(2.0);
        let dest = g.destination();
        g.connect(src, a).unwrap();
        g.connect(src, b).unwrap();
        g.connect(a, dest).unwrap();
        g.connect(b, dest).unwrap();
        g.start(src, 0.0).unwrap();

        let out = g.render().unwrap();
        assert_eq!(out.channel(0).unwrap(), &[0.75; 4]);
    }

    #[test]
    fn repeated_connections_sum_each_time() {
        let mut g = OfflineGraph::new(1, 4, 24000);
        let src = g.create_source(AudioBuffer::mono(vec![0.25; 4], 24000), 1.0, 0.0);
        let gain = g.create_gain(2.0);
        let dest = g.destination();
        g.connect(src, gain).unwrap();
        g.connect(src, dest).unwrap();
        g.connect(gain, dest).unwrap();
        g.connect(gain, dest).unwrap();
        g.start(src, 0.0).unwrap();

        // 0.25 direct + 2 * (0.25 * 2.0)
        let out = g.render().unwrap();
        assert_eq!(out.channel(0).unwrap(), &[1.25; 4]);
    }

    #[test]
    fn shared_source_survives_until_last_reader() {
        // The source feeds a gain chain and the convolver; the convolver is
        // rendered after the chain has consumed its copy.
        let mut g = OfflineGraph::new(1, 6, 24000);
        let src = g.create_source(AudioBuffer::mono(vec![0.5; 6], 24000), 1.0, 0.0);
        let dry = g.create_gain(1.0);
        let conv = g.create_convolver(AudioBuffer::mono(vec![1.0], 24000)).unwrap();
        let wet = g.create_gain(1.0);
        let dest = g.destination();
        g.connect(src, dry).unwrap();
        g.connect(dry, dest).unwrap();
        g.connect(src, conv).unwrap();
        g.connect(conv, wet).unwrap();
        g.connect(wet, dest).unwrap();
        g.start(src, 0.0).unwrap();

        let scale = Convolver::new(AudioBuffer::mono(vec![1.0], 24000)).unwrap().scale;
        let out = g.render().unwrap();
        for &s in out.channel(0).unwrap() {
            assert!((s - (0.5 + 0.5 * scale)).abs() < 1e-3 * (1.0 + scale), "{s}");
        }
    }

    #[test]
    fn unconnected_nodes_do_not_contribute() {
        let mut g = OfflineGraph::new(1, 8, 24000);
        let src = g.create_source(tone(8), 1.0, 0.0);
        let gain = g.create_gain(1.0);
        g.connect(src, gain).unwrap();
        g.start(src, 0.0).unwrap();
        assert_eq!(g.render().unwrap().energy(), 0.0);
    }

    #[test]
    fn unstarted_source_is_silent() {
        let mut g = OfflineGraph::new(1, 8, 24000);
        let src = g.create_source(tone(8), 1.0, 0.0);
        g.connect(src, g.destination()).unwrap();
        assert_eq!(g.render().unwrap().energy(), 0.0);
    }

    #[test]
    fn stereo_context_copies_mono_mix() {
        let mut g = OfflineGraph::new(2, 6, 24000);
        let src = g.create_source(tone(6), 1.0, 0.0);
        g.connect(src, g.destination()).unwrap();
        g.start(src, 0.0).unwrap();
        let out = g.render().unwrap();
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.channel(0), out.channel(1));
    }

    #[test]
    fn convolver_path_renders_tail_within_frames() {
        let mut g = OfflineGraph::new(1, 200, 24000);
        let src = g.create_source(AudioBuffer::mono(vec![1.0], 24000), 1.0, 0.0);
        let conv = g.create_convolver(AudioBuffer::mono(vec![0.5; 100], 24000)).unwrap();
        g.connect(src, conv).unwrap();
        g.connect(conv, g.destination()).unwrap();
        g.start(src, 0.0).unwrap();

        let out = g.render().unwrap();
        let data = out.channel(0).unwrap();
        assert!(data[..100].iter().all(|&s| s.abs() > 0.0));
        assert!(data[100..].iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn rejects_bad_wiring() {
        let mut g = OfflineGraph::new(1, 8, 24000);
        let src = g.create_source(tone(8), 1.0, 0.0);
        let gain = g.create_gain(1.0);

        assert!(matches!(g.connect(gain, src), Err(RenderError::SourceInput(_))));
        assert!(matches!(g.connect(gain, NodeId(99)), Err(RenderError::UnknownNode(99))));
        assert!(matches!(g.start(gain, 0.0), Err(RenderError::NotASource(_))));
        assert!(matches!(g.start(src, -1.0), Err(RenderError::InvalidStartTime(_))));
    }

    #[test]
    fn cycles_fail_the_render() {
        let mut g = OfflineGraph::new(1, 8, 24000);
        let a = g.create_gain(1.0);
        let b = g.create_gain(1.0);
        g.connect(a, b).unwrap();
        g.connect(b, a).unwrap();
        g.connect(b, g.destination()).unwrap();
        assert!(matches!(g.render(), Err(RenderError::Cycle(_))));
    }

    #[test]
    fn create_buffer_uses_graph_rate() {
        let g = OfflineGraph::new(1, 8, 16000);
        let buf = g.create_buffer(2, 32);
        assert_eq!(buf.sample_rate(), 16000);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.frames(), 32);
    }
}
