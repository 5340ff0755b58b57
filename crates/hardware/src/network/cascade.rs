//! Many-to-few request fabric.
//!
//! A `Cascade` funnels `N` input ports onto `M` output ports (`M <= N`). Input `i` feeds
//! output `i * M / N`, so each output serves a contiguous group of inputs. Every input has a
//! one-entry latch and every output a one-entry slot:
//! 1. **Write:** A producer may write an input only while its latch is empty.
//! 2. **Clock:** Each empty output slot takes one latched input from its group, chosen
//!    round-robin starting after the input it served last.
//! 3. **Read:** A consumer drains an output slot, freeing it for the next clock.

/// Arbitrating N-to-M request network with one-entry buffering per port.
#[derive(Debug)]
pub struct Cascade<T> {
    inputs: Vec<Option<T>>,
    outputs: Vec<Option<T>>,
    /// Next input to consider, per output.
    candidates: Vec<usize>,
}

impl<T> Cascade<T> {
    /// Creates a cascade with `num_inputs` inputs and `num_outputs` outputs.
    ///
    /// # Panics
    ///
    /// Panics if either count is zero or there are more outputs than inputs.
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        assert!(num_inputs > 0 && num_outputs > 0, "cascade needs ports");
        assert!(
            num_outputs <= num_inputs,
            "cascade can't fan out ({num_inputs} inputs, {num_outputs} outputs)"
        );
        let candidates = (0..num_outputs)
            .map(|o| Self::first_input(o, num_inputs, num_outputs))
            .collect();
        Self {
            inputs: std::iter::repeat_with(|| None).take(num_inputs).collect(),
            outputs: std::iter::repeat_with(|| None).take(num_outputs).collect(),
            candidates,
        }
    }

    /// Number of input ports.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports.
    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Output port served by `input`.
    #[inline]
    pub fn output_for(&self, input: usize) -> usize {
        input * self.outputs.len() / self.inputs.len()
    }

    fn first_input(output: usize, num_inputs: usize, num_outputs: usize) -> usize {
        (output * num_inputs).div_ceil(num_outputs)
    }

    fn input_range(&self, output: usize) -> std::ops::Range<usize> {
        let (n, m) = (self.inputs.len(), self.outputs.len());
        Self::first_input(output, n, m)..Self::first_input(output + 1, n, m)
    }

    /// Returns true if `input` can accept a write this cycle.
    #[inline]
    pub fn is_write_valid(&self, input: usize) -> bool {
        self.inputs[input].is_none()
    }

    /// Latches `value` on `input`.
    ///
    /// # Panics
    ///
    /// Panics if the input latch is occupied.
    pub fn write(&mut self, value: T, input: usize) {
        assert!(self.is_write_valid(input), "cascade input {input} is occupied");
        self.inputs[input] = Some(value);
    }

    /// Moves at most one latched input into each empty output slot.
    pub fn clock(&mut self) {
        for output in 0..self.outputs.len() {
            if self.outputs[output].is_some() {
                continue;
            }
            let range = self.input_range(output);
            let width = range.len();
            for i in 0..width {
                let index = range.start + (self.candidates[output] - range.start + i) % width;
                if let Some(value) = self.inputs[index].take() {
                    self.outputs[output] = Some(value);
                    self.candidates[output] = range.start + (index - range.start + 1) % width;
                    break;
                }
            }
        }
    }

    /// Returns true if `output` holds a value.
    #[inline]
    pub fn is_read_valid(&self, output: usize) -> bool {
        self.outputs[output].is_some()
    }

    /// Borrows the value held by `output`.
    ///
    /// # Panics
    ///
    /// Panics if the output is empty.
    pub fn peek(&self, output: usize) -> &T {
        match &self.outputs[output] {
            Some(value) => value,
            None => panic!("cascade output {output} is empty"),
        }
    }

    /// Takes the value held by `output`.
    ///
    /// # Panics
    ///
    /// Panics if the output is empty.
    pub fn read(&mut self, output: usize) -> T {
        match self.outputs[output].take() {
            Some(value) => value,
            None => panic!("cascade output {output} is empty"),
        }
    }

    /// Returns true if nothing is latched anywhere in the network.
    pub fn is_idle(&self) -> bool {
        self.inputs.iter().chain(self.outputs.iter()).all(Option::is_none)
    }
}
