use serde::Serialize;

use minisys_asm::{AssembledProgram, LinkedImage};

/// Counts reported after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub instructions: usize,
    pub labels: usize,
    pub variables: usize,
    pub text_bytes: usize,
    pub data_bytes: usize,
    pub image_words: usize,
}

impl Summary {
    pub fn new(program: &AssembledProgram, image: &LinkedImage) -> Self {
        Self {
            instructions: program.text.instructions.len(),
            labels: program.text.labels.len(),
            variables: program.data.len(),
            text_bytes: program.text.size(),
            data_bytes: image.data.len(),
            image_words: image.memory.words().len(),
        }
    }

    pub fn to_text(&self) -> String {
        format!(
            "instructions: {}\nlabels:       {}\nvariables:    {}\ntext bytes:   {}\ndata bytes:   {}\nimage words:  {}",
            self.instructions, self.labels, self.variables, self.text_bytes, self.data_bytes, self.image_words
        )
    }
}
